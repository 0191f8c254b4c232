//! Link service - the two-call handshake that connects an institution

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::{Error, LinkToken, LinkedItem, NewLinkedItem, Result, Session, UserScope};
use crate::ports::BankDataAggregator;

/// Where a link attempt currently stands
///
/// Phases exist only in the flow that drives them; nothing here is ever
/// persisted. `Linked` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Unlinked,
    PendingEphemeralToken,
    AwaitingUserAuthorization,
    Exchanging,
    Linked,
    Failed,
}

/// In-flight record of one link attempt
///
/// Callers walk it forward as the flow progresses. Calling a transition
/// out of order is a bug in the driver, not a runtime condition.
#[derive(Debug)]
pub struct Handshake {
    phase: HandshakePhase,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::Unlinked,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// A link token was requested from the aggregator
    pub fn token_requested(&mut self) {
        self.advance(HandshakePhase::Unlinked, HandshakePhase::PendingEphemeralToken);
    }

    /// The token was handed to the authorization UI; the user is in control
    pub fn authorization_opened(&mut self) {
        self.advance(
            HandshakePhase::PendingEphemeralToken,
            HandshakePhase::AwaitingUserAuthorization,
        );
    }

    /// A public token came back and the exchange call is in flight
    pub fn exchange_started(&mut self) {
        self.advance(
            HandshakePhase::AwaitingUserAuthorization,
            HandshakePhase::Exchanging,
        );
    }

    /// The exchange committed and the item is registered
    pub fn completed(&mut self) {
        self.advance(HandshakePhase::Exchanging, HandshakePhase::Linked);
    }

    /// The attempt is over; any phase can fail
    pub fn failed(&mut self) {
        self.phase = HandshakePhase::Failed;
    }

    fn advance(&mut self, expected: HandshakePhase, next: HandshakePhase) {
        debug_assert_eq!(self.phase, expected, "handshake driven out of order");
        self.phase = next;
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Link service for the institution connection handshake
///
/// The protocol is two calls: `request_link_token` opens the aggregator's
/// authorization flow, `finalize_link` turns the public token the flow
/// produced into a registered item. The core never waits in between.
pub struct LinkService {
    store: Arc<DuckDbStore>,
    aggregator: Arc<dyn BankDataAggregator>,
    products: Vec<String>,
}

impl LinkService {
    pub fn new(
        store: Arc<DuckDbStore>,
        aggregator: Arc<dyn BankDataAggregator>,
        products: Vec<String>,
    ) -> Self {
        Self {
            store,
            aggregator,
            products,
        }
    }

    /// Request a short-lived link token for this identity
    ///
    /// Touches nothing locally; an abandoned flow leaves no trace.
    pub fn request_link_token(&self, scope: &UserScope) -> Result<LinkToken> {
        self.aggregator
            .create_link_token(scope.identity(), &self.products)
    }

    /// Exchange a public token and register the resulting item
    ///
    /// Each public token finalizes at most once: its fingerprint and the
    /// new item commit in one store transaction, so a replay or a
    /// concurrent retry leaves exactly one item and fails with
    /// `ExchangeFailed`. With `multi` unset, a second item for an
    /// institution this identity already linked is rejected as
    /// `DuplicateLink`; the token is burned either way.
    pub fn finalize_link(
        &self,
        scope: &UserScope,
        public_token: &str,
        multi: bool,
    ) -> Result<LinkedItem> {
        let fingerprint = Session::fingerprint(public_token);

        // Replay check before spending a network call.
        if self.store.is_token_consumed(&fingerprint)? {
            return Err(Error::exchange_failed("public token already consumed"));
        }

        let grant = self
            .aggregator
            .exchange_public_token(scope.identity(), public_token)?;

        if !multi
            && self
                .store
                .has_active_link(scope.identity_id(), &grant.institution_id)?
        {
            // The aggregator consumed the token, so record it; replays of
            // this token must keep failing even though no item was made.
            self.store
                .record_consumed_token(&fingerprint, scope.identity_id())?;
            return Err(Error::DuplicateLink {
                institution_id: grant.institution_id,
            });
        }

        let item = LinkedItem::new(NewLinkedItem {
            identity_id: scope.identity_id(),
            item_ref: grant.item_ref,
            institution_id: grant.institution_id,
            institution_name: grant.institution_name,
            access_credential: grant.access_credential,
        });

        self.store.commit_exchange(&fingerprint, &item)
    }
}
