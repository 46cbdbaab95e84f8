//! # Registration Handshake
//!
//! Drives the `/register <email>` command: issue a code, store it and its
//! derived token, look up the account, and email the activation link. Each
//! step runs even when an earlier one failed, and the outcome of every step
//! is recorded in a [`RegistrationReport`].
//!
//! A failed email leaves the code and token live until they expire; the user
//! re-issues the command to get a fresh pair.

use std::fmt;
use std::sync::Arc;

use metrics::counter;
use rand::Rng;
use tracing::{Span, info, instrument, warn};

use crate::clients::{EmailSender, ProfileLookup, ValidationEmail};
use crate::config::TelegramConfig;
use crate::locale::Locale;
use crate::models::validation_code::{ActivationPayload, ValidationKey, derive_token};
use crate::repositories::ValidationCodeStore;

/// Exact prefix of the registration command.
pub const REGISTER_COMMAND: &str = "/register";

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_LENGTH: usize = 6;

/// Parsed registration request coming from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCommand {
    pub email: String,
    pub chat_id: String,
    /// "First Last" of the chat, shown in the email.
    pub chat_display_name: String,
}

/// Extracts the email from a `/register` message, stripping all whitespace.
///
/// Returns `None` when the text is not a registration command.
pub fn parse_register_command(text: &str) -> Option<String> {
    let rest = text.trim_start().strip_prefix(REGISTER_COMMAND)?;
    Some(rest.chars().filter(|c| !c.is_whitespace()).collect())
}

/// Saga steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStep {
    CodeGenerated,
    CodeStored,
    TokenStored,
    ProfileResolved,
    EmailSent,
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationStep::CodeGenerated => "code_generated",
            RegistrationStep::CodeStored => "code_stored",
            RegistrationStep::TokenStored => "token_stored",
            RegistrationStep::ProfileResolved => "profile_resolved",
            RegistrationStep::EmailSent => "email_sent",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
}

/// Partial-success report of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub email: String,
    pub code: String,
    pub token: String,
    pub activation_url: String,
    pub steps: Vec<(RegistrationStep, StepOutcome)>,
}

impl RegistrationReport {
    fn record<E: fmt::Display>(&mut self, step: RegistrationStep, result: Result<(), E>) {
        let outcome = match result {
            Ok(()) => StepOutcome::Succeeded,
            Err(err) => {
                warn!(step = %step, error = %err, "registration step failed");
                StepOutcome::Failed(err.to_string())
            }
        };
        self.steps.push((step, outcome));
    }

    pub fn outcome(&self, step: RegistrationStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(recorded, _)| *recorded == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn succeeded(&self, step: RegistrationStep) -> bool {
        matches!(self.outcome(step), Some(StepOutcome::Succeeded))
    }

    pub fn failed_steps(&self) -> Vec<RegistrationStep> {
        self.steps
            .iter()
            .filter(|(_, outcome)| matches!(outcome, StepOutcome::Failed(_)))
            .map(|(step, _)| *step)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.steps.len() == 5 && self.failed_steps().is_empty()
    }
}

/// Runs the registration saga against the code store and upstream services.
pub struct RegistrationHandler {
    codes: Arc<dyn ValidationCodeStore>,
    profiles: Arc<dyn ProfileLookup>,
    emails: Arc<dyn EmailSender>,
    activation_url: String,
    code_ttl_seconds: u32,
    brand_name: String,
    span: Span,
}

impl RegistrationHandler {
    pub fn new(
        codes: Arc<dyn ValidationCodeStore>,
        profiles: Arc<dyn ProfileLookup>,
        emails: Arc<dyn EmailSender>,
        config: &TelegramConfig,
        span: Span,
    ) -> Self {
        Self {
            codes,
            profiles,
            emails,
            activation_url: config.activation_url.trim_end_matches('/').to_string(),
            code_ttl_seconds: config.code_ttl_seconds,
            brand_name: config.brand_name.clone(),
            span,
        }
    }

    #[instrument(parent = &self.span, skip_all, fields(chat_id = %command.chat_id))]
    pub async fn register(&self, command: &RegisterCommand) -> RegistrationReport {
        let code = generate_code();
        let token = derive_token(&code, &command.email);
        let mut report = RegistrationReport {
            email: command.email.clone(),
            activation_url: format!("{}/{}", self.activation_url, token),
            code,
            token,
            steps: Vec::with_capacity(5),
        };
        report.record::<&str>(RegistrationStep::CodeGenerated, Ok(()));

        let payload = ActivationPayload::new(&command.email, &command.chat_id).encode();

        let stored = self
            .codes
            .save(
                &ValidationKey::Code(report.code.clone()),
                &payload,
                self.code_ttl_seconds,
            )
            .await;
        report.record(RegistrationStep::CodeStored, stored);

        let stored = self
            .codes
            .save(
                &ValidationKey::Token(report.token.clone()),
                &payload,
                self.code_ttl_seconds,
            )
            .await;
        report.record(RegistrationStep::TokenStored, stored);

        let (username, locale) = match self.profiles.get_profile_by_email(&command.email).await {
            Ok(profile) => {
                let locale = Locale::from_tag(&profile.language);
                let username = if profile.full_name.trim().is_empty() {
                    locale.default_member_name(&self.brand_name)
                } else {
                    profile.full_name
                };
                report.record::<&str>(RegistrationStep::ProfileResolved, Ok(()));
                (username, locale)
            }
            Err(err) => {
                report.record(RegistrationStep::ProfileResolved, Err(err));
                let locale = Locale::default();
                (locale.default_member_name(&self.brand_name), locale)
            }
        };

        let email = ValidationEmail {
            username,
            telegram_name: command.chat_display_name.clone(),
            validation_url: report.activation_url.clone(),
            code: report.code.clone(),
        };
        let sent = self
            .emails
            .send_validation_email(&command.email, locale.tag(), &email)
            .await;
        report.record(RegistrationStep::EmailSent, sent);

        let outcome = if report.is_complete() { "complete" } else { "partial" };
        counter!("notifier_registrations_total", "outcome" => outcome).increment(1);
        info!(
            outcome,
            failed_steps = ?report.failed_steps(),
            "registration handshake finished"
        );

        report
    }
}

/// Six characters from `[0-9A-Z]` drawn from the thread-local CSPRNG.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_prefix_is_exact() {
        assert_eq!(
            parse_register_command("/register  a@b.com "),
            Some("a@b.com".to_string())
        );
        assert_eq!(
            parse_register_command("/register a @ b.com"),
            Some("a@b.com".to_string())
        );
        assert_eq!(parse_register_command("/register"), Some(String::new()));
        assert_eq!(parse_register_command("register a@b.com"), None);
        assert_eq!(parse_register_command("/start"), None);
    }

    #[test]
    fn codes_use_fixed_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn report_tracks_failures() {
        let mut report = RegistrationReport {
            email: "a@b.com".into(),
            code: "ABC123".into(),
            token: "t".into(),
            activation_url: "u".into(),
            steps: Vec::new(),
        };
        report.record::<&str>(RegistrationStep::CodeGenerated, Ok(()));
        report.record(RegistrationStep::EmailSent, Err("smtp down"));

        assert!(report.succeeded(RegistrationStep::CodeGenerated));
        assert_eq!(report.failed_steps(), vec![RegistrationStep::EmailSent]);
        assert_eq!(report.outcome(RegistrationStep::TokenStored), None);
        assert!(!report.is_complete());
    }
}
