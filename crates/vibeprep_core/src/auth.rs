//! crates/vibeprep_core/src/auth.rs
//!
//! The signup / verify / login state machine.
//!
//! Per email the lifecycle is `unregistered -> pending_verification -> verified`.
//! Accounts are only created by `verify`; `signup` never touches the user table.

use std::sync::{Arc, LazyLock};

use chrono::{Duration, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::domain::{LoginGrant, NewUser, PendingVerification, SignupForm, User};
use crate::error::{ServiceError, ServiceResult};
use crate::otp::otp_email;
use crate::ports::{
    CredentialHasher, CredentialStore, NotificationService, OtpGenerator, PortError, TokenService,
};

pub const DEFAULT_OTP_TTL_MINUTES: i64 = 10;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is a valid regex")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Orchestrates account registration and login against the injected ports.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn NotificationService>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenService>,
    otp: Arc<dyn OtpGenerator>,
    otp_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn NotificationService>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
        otp: Arc<dyn OtpGenerator>,
    ) -> Self {
        Self {
            store,
            notifier,
            hasher,
            tokens,
            otp,
            otp_ttl: Duration::minutes(DEFAULT_OTP_TTL_MINUTES),
        }
    }

    pub fn with_otp_ttl(mut self, ttl: Duration) -> Self {
        self.otp_ttl = ttl;
        self
    }

    /// Registers a pending account and mails its verification code.
    ///
    /// If the mail cannot be sent the pending record is removed again and the
    /// call fails with `Delivery`.
    pub async fn signup(&self, form: SignupForm) -> ServiceResult<()> {
        let email = form.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(ServiceError::Validation(format!(
                "'{email}' is not a valid email address"
            )));
        }
        if form.password.is_empty() {
            return Err(ServiceError::Validation("Password cannot be empty".to_string()));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            warn!(%email, "Signup rejected, account already exists");
            return Err(ServiceError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let draft = NewUser {
            email: email.clone(),
            first_name: form.first_name,
            last_name: form.last_name,
            phone_number: form.phone_number,
            password_hash: self.hasher.hash(&form.password)?,
            class_name: form.class_name,
            target_exam: form.target_exam,
            is_verified: false,
            created_at: now,
        };
        let first_name = draft.first_name.clone();

        let otp = self.otp.generate();
        self.store
            .save_pending(PendingVerification {
                email: email.clone(),
                otp: otp.clone(),
                user_data: draft,
                expires_at: now + self.otp_ttl,
                created_at: now,
            })
            .await?;

        if let Err(e) = self.dispatch_code(&email, &first_name, &otp).await {
            // Only our own record: a concurrent signup may have replaced it.
            if let Err(cleanup) = self.store.delete_pending(&email, &otp).await {
                warn!(%email, error = %cleanup, "Failed to roll back pending verification");
            }
            return Err(e);
        }

        info!(%email, "Verification code issued");
        Ok(())
    }

    /// Activates the account behind a live pending record whose code matches.
    pub async fn verify(&self, email: &str, code: &str) -> ServiceResult<User> {
        let email = email.trim();
        let pending = match self.store.find_pending(email).await? {
            Some(p) if p.otp == code && p.is_live(Utc::now()) => p,
            _ => {
                warn!(%email, "Rejected verification attempt");
                return Err(ServiceError::InvalidOrExpired);
            }
        };

        let user = match self.store.find_user_by_email(email).await? {
            Some(existing) if existing.is_verified => {
                return Err(ServiceError::Conflict(
                    "User with this email already exists".to_string(),
                ))
            }
            // An account that predates verification: activate it in place.
            Some(_) => self
                .store
                .mark_user_verified(email)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("User {email} not found")))?,
            None => {
                let mut draft = pending.user_data;
                draft.is_verified = true;
                self.store.insert_user(draft).await.map_err(|e| match e {
                    PortError::Conflict(_) => ServiceError::Conflict(
                        "User with this email already exists".to_string(),
                    ),
                    other => ServiceError::Port(other),
                })?
            }
        };
        self.store.delete_pending(email, &pending.otp).await?;

        info!(%email, user_id = %user.id, "Account verified");
        Ok(user)
    }

    /// Rotates the code on an existing pending record and mails it again.
    ///
    /// Unlike `signup`, a delivery failure does not undo the rotation.
    pub async fn resend(&self, email: &str) -> ServiceResult<()> {
        let email = email.trim();
        let pending = self.store.find_pending(email).await?.ok_or_else(|| {
            ServiceError::NotFound("No pending verification found for this email".to_string())
        })?;

        let otp = self.otp.generate();
        let rotated = self
            .store
            .rotate_pending_code(email, &otp, Utc::now() + self.otp_ttl)
            .await?;
        if !rotated {
            return Err(ServiceError::NotFound(
                "No pending verification found for this email".to_string(),
            ));
        }

        self.dispatch_code(email, &pending.user_data.first_name, &otp)
            .await?;
        info!(%email, "Verification code re-issued");
        Ok(())
    }

    /// Checks credentials and, for verified accounts, mints a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginGrant> {
        let email = email.trim();
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(%email, "Login rejected, bad password");
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.is_verified {
            if self.store.find_pending(email).await?.is_some() {
                return Err(ServiceError::NotVerified(
                    "Email not verified. Please check your email for OTP verification."
                        .to_string(),
                ));
            }

            let now = Utc::now();
            let otp = self.otp.generate();
            self.store
                .save_pending(PendingVerification {
                    email: user.email.clone(),
                    otp: otp.clone(),
                    user_data: NewUser::from(&user),
                    expires_at: now + self.otp_ttl,
                    created_at: now,
                })
                .await?;
            self.dispatch_code(&user.email, &user.first_name, &otp)
                .await?;

            info!(%email, "Unverified login, fresh verification code issued");
            return Err(ServiceError::NotVerified(
                "Account not verified. New OTP sent to your email.".to_string(),
            ));
        }

        let access_token = self.tokens.issue(&user.email)?;
        info!(%email, "Login succeeded");
        Ok(LoginGrant { access_token, user })
    }

    /// Resolves a bearer token to its account. Fails closed.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<User> {
        let claims = self
            .tokens
            .verify(token)
            .map_err(|_| ServiceError::Unauthorized)?;
        self.store
            .find_user_by_email(&claims.sub)
            .await?
            .ok_or(ServiceError::Unauthorized)
    }

    async fn dispatch_code(&self, email: &str, first_name: &str, otp: &str) -> ServiceResult<()> {
        let message = otp_email(email, first_name, otp, self.otp_ttl.num_minutes());
        self.notifier.send(&message).await.map_err(|e| {
            warn!(%email, error = %e, "Verification email could not be delivered");
            ServiceError::Delivery(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::OutgoingEmail;
    use crate::testing::{
        InMemoryCredentialStore, OpaqueTokens, PlainHasher, RecordingNotifier, ScriptedOtp,
    };

    struct Harness {
        store: Arc<InMemoryCredentialStore>,
        notifier: Arc<RecordingNotifier>,
        auth: AuthService,
    }

    fn harness(codes: &[&str]) -> Harness {
        let store = Arc::new(InMemoryCredentialStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let auth = AuthService::new(
            store.clone(),
            notifier.clone(),
            Arc::new(PlainHasher),
            Arc::new(OpaqueTokens),
            Arc::new(ScriptedOtp::new(codes)),
        );
        Harness {
            store,
            notifier,
            auth,
        }
    }

    fn form(email: &str, password: &str) -> SignupForm {
        SignupForm {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: email.into(),
            phone_number: "+91 90000 00000".into(),
            password: password.into(),
            class_name: "12".into(),
            target_exam: "JEE".into(),
        }
    }

    #[tokio::test]
    async fn signup_then_verify_creates_one_verified_user() {
        let h = harness(&["123456"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();

        assert!(h.store.user("a@x.com").await.is_none());
        let pending = h.store.pending("a@x.com").await.unwrap();
        assert_eq!(pending.otp, "123456");
        assert!(!pending.user_data.is_verified);

        let user = h.auth.verify("a@x.com", "123456").await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(user.is_verified);
        assert_eq!(h.store.user_count().await, 1);
        assert!(h.store.pending("a@x.com").await.is_none());

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html_body.contains("123456"));
    }

    #[tokio::test]
    async fn signup_for_existing_account_conflicts() {
        let h = harness(&["111111", "222222"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();
        h.auth.verify("a@x.com", "111111").await.unwrap();

        let err = h.auth.signup(form("a@x.com", "p2")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(h.store.pending("a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn second_signup_replaces_the_pending_record() {
        let h = harness(&["111111", "222222"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();
        h.auth.signup(form("a@x.com", "p2")).await.unwrap();

        assert_eq!(h.store.pending_count().await, 1);
        assert!(matches!(
            h.auth.verify("a@x.com", "111111").await,
            Err(ServiceError::InvalidOrExpired)
        ));
        let user = h.auth.verify("a@x.com", "222222").await.unwrap();
        assert_eq!(user.password_hash, "plain:p2");
    }

    #[tokio::test]
    async fn failed_delivery_rolls_signup_back() {
        let h = harness(&["123456"]);
        h.notifier.fail_next(1);

        let err = h.auth.signup(form("a@x.com", "p1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Delivery(_)));
        assert!(h.store.pending("a@x.com").await.is_none());
        assert_eq!(h.store.user_count().await, 0);
    }

    /// Lets a competing signup replace the pending record, then fails delivery.
    struct ReplacedBeforeFailure {
        store: Arc<InMemoryCredentialStore>,
    }

    #[async_trait::async_trait]
    impl NotificationService for ReplacedBeforeFailure {
        async fn send(&self, email: &OutgoingEmail) -> crate::ports::PortResult<()> {
            for to in &email.recipients {
                self.store
                    .seed_pending(to, "999999", Utc::now() + Duration::minutes(10))
                    .await;
            }
            Err(PortError::Unexpected("SMTP relay refused the message".into()))
        }
    }

    #[tokio::test]
    async fn failed_delivery_keeps_a_concurrent_signups_record() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let auth = AuthService::new(
            store.clone(),
            Arc::new(ReplacedBeforeFailure {
                store: store.clone(),
            }),
            Arc::new(PlainHasher),
            Arc::new(OpaqueTokens),
            Arc::new(ScriptedOtp::new(&["123456"])),
        );

        let err = auth.signup(form("a@x.com", "p1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Delivery(_)));
        assert_eq!(store.pending("a@x.com").await.unwrap().otp, "999999");
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_before_any_write() {
        let h = harness(&["123456"]);
        let err = h.auth.signup(form("not-an-email", "p1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(h.store.pending_count().await, 0);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn expired_code_is_rejected_even_when_correct() {
        let h = harness(&["123456"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();
        h.store
            .expire_pending("a@x.com", Utc::now() - Duration::seconds(1))
            .await;

        assert!(matches!(
            h.auth.verify("a@x.com", "123456").await,
            Err(ServiceError::InvalidOrExpired)
        ));
        assert_eq!(h.store.user_count().await, 0);
    }

    #[tokio::test]
    async fn wrong_code_and_unknown_email_are_rejected() {
        let h = harness(&["123456"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();

        assert!(matches!(
            h.auth.verify("a@x.com", "654321").await,
            Err(ServiceError::InvalidOrExpired)
        ));
        assert!(matches!(
            h.auth.verify("b@x.com", "123456").await,
            Err(ServiceError::InvalidOrExpired)
        ));
        assert!(h.store.pending("a@x.com").await.is_some());
    }

    #[tokio::test]
    async fn resend_invalidates_the_previous_code() {
        let h = harness(&["111111", "222222"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();
        let before = h.store.pending("a@x.com").await.unwrap();

        h.auth.resend("a@x.com").await.unwrap();
        let after = h.store.pending("a@x.com").await.unwrap();
        assert_eq!(after.otp, "222222");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.expires_at >= before.expires_at);

        assert!(matches!(
            h.auth.verify("a@x.com", "111111").await,
            Err(ServiceError::InvalidOrExpired)
        ));
        assert!(h.auth.verify("a@x.com", "222222").await.is_ok());
        assert_eq!(h.notifier.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn resend_without_pending_record_is_not_found() {
        let h = harness(&[]);
        assert!(matches!(
            h.auth.resend("ghost@x.com").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resend_keeps_rotation_when_delivery_fails() {
        let h = harness(&["111111", "222222"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();
        h.notifier.fail_next(1);

        let err = h.auth.resend("a@x.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Delivery(_)));
        assert_eq!(h.store.pending("a@x.com").await.unwrap().otp, "222222");
    }

    #[tokio::test]
    async fn login_issues_token_for_verified_user() {
        let h = harness(&["123456"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();
        h.auth.verify("a@x.com", "123456").await.unwrap();

        let grant = h.auth.login("a@x.com", "p1").await.unwrap();
        assert_eq!(grant.access_token, "token:a@x.com");
        assert_eq!(grant.user.first_name, "Asha");

        let user = h.auth.authenticate(&grant.access_token).await.unwrap();
        assert_eq!(user.email, "a@x.com");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let h = harness(&["123456"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();

        // Pending only: no account yet.
        assert!(matches!(
            h.auth.login("a@x.com", "p1").await,
            Err(ServiceError::InvalidCredentials)
        ));
        h.auth.verify("a@x.com", "123456").await.unwrap();
        assert!(matches!(
            h.auth.login("a@x.com", "wrong").await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn unverified_login_with_pending_record_has_no_side_effect() {
        let h = harness(&["999999"]);
        h.store.seed_user(form("u@x.com", "pw"), false).await;
        h.store
            .seed_pending("u@x.com", "424242", Utc::now() + Duration::minutes(5))
            .await;

        assert!(matches!(
            h.auth.login("u@x.com", "pw").await,
            Err(ServiceError::NotVerified(_))
        ));
        assert_eq!(h.store.pending("u@x.com").await.unwrap().otp, "424242");
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn unverified_login_without_pending_record_issues_a_code() {
        let h = harness(&["555555"]);
        h.store.seed_user(form("u@x.com", "pw"), false).await;

        assert!(matches!(
            h.auth.login("u@x.com", "pw").await,
            Err(ServiceError::NotVerified(_))
        ));
        let pending = h.store.pending("u@x.com").await.unwrap();
        assert_eq!(pending.otp, "555555");
        assert_eq!(pending.user_data.first_name, "Asha");
        assert_eq!(h.notifier.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn unverified_login_surfaces_delivery_failure() {
        let h = harness(&["555555"]);
        h.store.seed_user(form("u@x.com", "pw"), false).await;
        h.notifier.fail_next(1);

        assert!(matches!(
            h.auth.login("u@x.com", "pw").await,
            Err(ServiceError::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn authenticate_fails_closed() {
        let h = harness(&[]);
        assert!(matches!(
            h.auth.authenticate("garbage").await,
            Err(ServiceError::Unauthorized)
        ));
        // Well-formed token whose subject has no account.
        assert!(matches!(
            h.auth.authenticate("token:nobody@x.com").await,
            Err(ServiceError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn duplicate_verification_does_not_create_a_second_account() {
        let h = harness(&["123456"]);
        h.auth.signup(form("a@x.com", "p1")).await.unwrap();
        h.auth.verify("a@x.com", "123456").await.unwrap();

        // A racing verifier that still holds a live record for the same email.
        h.store
            .seed_pending("a@x.com", "123456", Utc::now() + Duration::minutes(5))
            .await;
        assert!(matches!(
            h.auth.verify("a@x.com", "123456").await,
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(h.store.user_count().await, 1);
    }

    #[tokio::test]
    async fn verifying_an_unverified_account_activates_it_in_place() {
        let h = harness(&["555555"]);
        let seeded = h.store.seed_user(form("u@x.com", "pw"), false).await;
        let _ = h.auth.login("u@x.com", "pw").await;

        let user = h.auth.verify("u@x.com", "555555").await.unwrap();
        assert_eq!(user.id, seeded.id);
        assert!(user.is_verified);
        assert_eq!(h.store.user_count().await, 1);
        assert!(h.auth.login("u@x.com", "pw").await.is_ok());
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("student.one+jee@school.edu.in"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
    }
}
