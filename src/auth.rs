use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub mod policy;
pub mod provider;

pub use self::policy::AccessPolicy;
pub use self::provider::{DiscordIdentityProvider, IdentityProvider, ProviderUser};

/// A staff member as resolved at login time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    #[serde(with = "role_ids")]
    pub roles: Vec<u64>,
    pub is_owner: bool,
}

/// Role ids are Discord snowflakes wider than a JS number, so they travel as strings.
mod role_ids {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(roles: &[u64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(roles.iter().map(u64::to_string))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|role| role.parse().map_err(D::Error::custom))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity provider failed during {stage} (status {status:?})")]
    Provider {
        stage: &'static str,
        status: Option<u16>,
        body: String,
    },
    #[error("access denied for user {user_id}")]
    AccessDenied {
        user_id: String,
        roles: Vec<u64>,
        is_owner: bool,
    },
    #[error("missing authorization code")]
    MissingCode,
    #[error("invalid or missing login state")]
    InvalidState,
}

impl AuthError {
    pub fn provider(stage: &'static str, status: Option<u16>, body: impl Into<String>) -> Self {
        AuthError::Provider {
            stage,
            status,
            body: body.into(),
        }
    }
}

/// Runs the OAuth code through the provider and decides whether the user is staff.
///
/// The token exchange and the user fetch are fatal. Member roles and the guild
/// owner are best-effort: a failure there only narrows what the user is granted.
pub async fn authenticate(
    provider: &dyn IdentityProvider,
    policy: &AccessPolicy,
    code: &str,
) -> Result<Principal, AuthError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AuthError::MissingCode);
    }

    let token = provider.exchange_code(code).await?;
    let user = provider.fetch_user(&token).await?;
    let roles = provider.fetch_member_roles(&token).await;
    let owner_id = provider.guild_owner_id().await;

    let is_owner = match (owner_id, user.id.parse::<u64>()) {
        (Some(owner), Ok(id)) => owner == id,
        _ => false,
    };

    let principal = Principal {
        id: user.id,
        username: user.username,
        discriminator: user.discriminator.unwrap_or_else(|| "0".to_string()),
        avatar: user.avatar,
        roles,
        is_owner,
    };

    match policy.authorize(&principal) {
        Ok(()) => {
            info!(
                "login granted user_id={} is_owner={}",
                principal.id, principal.is_owner
            );
            Ok(principal)
        }
        Err(err) => {
            warn!(
                "login denied user_id={} roles={:?} is_owner={} allowed_roles={:?}",
                principal.id,
                principal.roles,
                principal.is_owner,
                policy.allowed_roles()
            );
            Err(err)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};

    use super::{AccessPolicy, AuthError, IdentityProvider, Principal, ProviderUser, authenticate};

    /// Scripted provider. `exchange_status` of `Some` makes the code exchange fail.
    pub(crate) struct FakeProvider {
        pub user_id: String,
        pub roles: Vec<u64>,
        pub owner_id: Option<u64>,
        pub exchange_status: Option<u16>,
        pub exchanges: AtomicUsize,
    }

    impl FakeProvider {
        pub(crate) fn new(user_id: &str, roles: Vec<u64>, owner_id: Option<u64>) -> Self {
            Self {
                user_id: user_id.to_string(),
                roles,
                owner_id,
                exchange_status: None,
                exchanges: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorize_url(&self, state: &str) -> String {
            format!("https://provider.test/authorize?state={state}")
        }

        async fn exchange_code(&self, code: &str) -> Result<SecretString, AuthError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            match self.exchange_status {
                Some(status) => Err(AuthError::provider(
                    "token exchange",
                    Some(status),
                    "{\"error\":\"invalid_grant\"}",
                )),
                None => Ok(SecretString::from(format!("token-for-{code}"))),
            }
        }

        async fn fetch_user(&self, token: &SecretString) -> Result<ProviderUser, AuthError> {
            assert!(token.expose_secret().starts_with("token-for-"));
            Ok(ProviderUser {
                id: self.user_id.clone(),
                username: "staffer".to_string(),
                discriminator: None,
                avatar: None,
            })
        }

        async fn fetch_member_roles(&self, _token: &SecretString) -> Vec<u64> {
            self.roles.clone()
        }

        async fn guild_owner_id(&self) -> Option<u64> {
            self.owner_id
        }
    }

    pub(crate) fn staff_principal(id: &str, roles: Vec<u64>) -> Principal {
        Principal {
            id: id.to_string(),
            username: format!("user-{id}"),
            discriminator: "0".to_string(),
            avatar: None,
            roles,
            is_owner: false,
        }
    }

    fn policy() -> AccessPolicy {
        AccessPolicy::new(vec![100, 200])
    }

    #[tokio::test]
    async fn matching_role_grants_access() {
        let provider = FakeProvider::new("42", vec![7, 200], Some(1));
        let principal = authenticate(&provider, &policy(), "abc")
            .await
            .expect("granted");
        assert_eq!(principal.id, "42");
        assert_eq!(principal.discriminator, "0");
        assert!(!principal.is_owner);
    }

    #[tokio::test]
    async fn owner_without_roles_is_granted() {
        let provider = FakeProvider::new("42", vec![], Some(42));
        let principal = authenticate(&provider, &policy(), "abc")
            .await
            .expect("granted");
        assert!(principal.is_owner);
    }

    #[tokio::test]
    async fn unknown_owner_falls_back_to_roles() {
        let provider = FakeProvider::new("42", vec![], None);
        let err = authenticate(&provider, &policy(), "abc")
            .await
            .expect_err("denied");
        match err {
            AuthError::AccessDenied {
                user_id,
                roles,
                is_owner,
            } => {
                assert_eq!(user_id, "42");
                assert!(roles.is_empty());
                assert!(!is_owner);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_exchange_is_fatal() {
        let mut provider = FakeProvider::new("42", vec![100], None);
        provider.exchange_status = Some(400);
        let err = authenticate(&provider, &policy(), "abc")
            .await
            .expect_err("provider failure");
        assert!(matches!(
            err,
            AuthError::Provider {
                status: Some(400),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn blank_code_never_reaches_provider() {
        let provider = FakeProvider::new("42", vec![100], None);
        let err = authenticate(&provider, &policy(), "  ")
            .await
            .expect_err("missing code");
        assert!(matches!(err, AuthError::MissingCode));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn role_ids_serialize_as_strings() {
        let principal = staff_principal("42", vec![1365633918593794079]);
        let value = serde_json::to_value(&principal).expect("serialize");
        assert_eq!(value["roles"], serde_json::json!(["1365633918593794079"]));

        let back: Principal = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back.roles, vec![1365633918593794079]);
    }
}
