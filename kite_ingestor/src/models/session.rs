use serde::{Deserialize, Serialize};

/// User session returned by the request-token → access-token exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub access_token: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    /// Kite names this field `email`.
    #[serde(default, alias = "email")]
    pub user_email: String,
    #[serde(default)]
    pub user_shortname: String,
    #[serde(default)]
    pub broker: String,
}
