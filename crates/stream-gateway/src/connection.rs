//! A client connection as seen by the fan-out layer.
//!
//! The handshake and authentication live outside this crate; by the time a
//! [`Connection`] is built, its meeting, user and authorization attributes
//! are settled and never change.

use crate::delivery::DeliveryChannel;
use crate::registry::SubscriptionRegistry;

use std::collections::HashMap;

/// Session variable naming the meeting the user moderates.
pub const MODERATOR_IN_MEETING_VAR: &str = "x-hasura-moderatorinmeeting";

/// Session variable naming the meeting the user presents in.
pub const PRESENTER_IN_MEETING_VAR: &str = "x-hasura-presenterinmeeting";

/// Meeting roles that role-targeted notifications can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Moderator,
    Presenter,
}

impl Role {
    /// Case-insensitive parse of a bus role name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("moderator") {
            Some(Role::Moderator)
        } else if value.eq_ignore_ascii_case("presenter") {
            Some(Role::Presenter)
        } else {
            None
        }
    }
}

/// Per-meeting roles held by a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorizations {
    moderator_in: Option<String>,
    presenter_in: Option<String>,
}

impl Authorizations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the role attributes from the session variables established at
    /// handshake. Variable names are matched case-insensitively; empty
    /// values grant nothing.
    #[must_use]
    pub fn from_session_variables(vars: &HashMap<String, String>) -> Self {
        let lookup = |wanted: &str| {
            vars.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            moderator_in: lookup(MODERATOR_IN_MEETING_VAR),
            presenter_in: lookup(PRESENTER_IN_MEETING_VAR),
        }
    }

    #[must_use]
    pub fn with_moderator(mut self, meeting_id: impl Into<String>) -> Self {
        self.moderator_in = Some(meeting_id.into());
        self
    }

    #[must_use]
    pub fn with_presenter(mut self, meeting_id: impl Into<String>) -> Self {
        self.presenter_in = Some(meeting_id.into());
        self
    }

    /// Whether this connection holds `role` in `meeting_id`.
    #[must_use]
    pub fn holds(&self, role: Role, meeting_id: &str) -> bool {
        let held = match role {
            Role::Moderator => self.moderator_in.as_deref(),
            Role::Presenter => self.presenter_in.as_deref(),
        };
        held == Some(meeting_id)
    }
}

/// One connected client.
#[derive(Debug)]
pub struct Connection {
    id: String,
    meeting_id: String,
    user_id: String,
    authorizations: Authorizations,
    subscriptions: SubscriptionRegistry,
    outbound: DeliveryChannel,
}

impl Connection {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        meeting_id: impl Into<String>,
        user_id: impl Into<String>,
        authorizations: Authorizations,
        outbound: DeliveryChannel,
    ) -> Self {
        Self {
            id: id.into(),
            meeting_id: meeting_id.into(),
            user_id: user_id.into(),
            authorizations,
            subscriptions: SubscriptionRegistry::new(),
            outbound,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn authorizations(&self) -> &Authorizations {
        &self.authorizations
    }

    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    #[must_use]
    pub fn outbound(&self) -> &DeliveryChannel {
        &self.outbound
    }

    /// Whether the connection belongs to `meeting_id`.
    #[must_use]
    pub fn in_meeting(&self, meeting_id: &str) -> bool {
        self.meeting_id == meeting_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("MODERATOR"), Some(Role::Moderator));
        assert_eq!(Role::parse("moderator"), Some(Role::Moderator));
        assert_eq!(Role::parse("Presenter"), Some(Role::Presenter));
        assert_eq!(Role::parse("viewer"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_holds_requires_matching_meeting() {
        let auth = Authorizations::new().with_moderator("m1");
        assert!(auth.holds(Role::Moderator, "m1"));
        assert!(!auth.holds(Role::Moderator, "m2"));
        assert!(!auth.holds(Role::Presenter, "m1"));
    }

    #[test]
    fn test_from_session_variables() {
        let vars = HashMap::from([
            ("X-Hasura-ModeratorInMeeting".to_string(), "m1".to_string()),
            (PRESENTER_IN_MEETING_VAR.to_string(), String::new()),
            ("x-hasura-userid".to_string(), "u1".to_string()),
        ]);

        let auth = Authorizations::from_session_variables(&vars);
        assert!(auth.holds(Role::Moderator, "m1"));
        assert!(!auth.holds(Role::Presenter, "m1"));
    }

    #[test]
    fn test_no_session_variables_grants_nothing() {
        let auth = Authorizations::from_session_variables(&HashMap::new());
        assert_eq!(auth, Authorizations::default());
        assert!(!auth.holds(Role::Moderator, ""));
    }
}
