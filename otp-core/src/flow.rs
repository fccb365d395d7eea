//! The generate / verify state machine

use crate::{
    common::{GenerateRequest, VerifyRequest},
    notification::Notification,
    traits::OtpTransport,
    validation::VerifyForm,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Which form is currently shown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowPhase {
    /// Collecting profile details to request a code
    Collecting,
    /// Waiting for the user to enter the code they received
    Verifying,
}

/// Session state owned by the controller.
///
/// Memory only, lives as long as the controller does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowState {
    /// Address of the last successful code request
    pub email: String,
    /// Whether a code was generated and not verified yet
    pub code_generated: bool,
}

/// Submissions the presentation layer can dispatch.
///
/// Both carry already validated requests, invalid input never gets here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowEvent {
    /// The generate form was submitted
    SubmitProfile(GenerateRequest),
    /// The verify form was submitted
    SubmitCode(VerifyRequest),
}

impl FlowEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::SubmitProfile(_) => "submit-profile",
            Self::SubmitCode(_) => "submit-code",
        }
    }
}

/// A dispatched event didn't fit the current state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// E.g. submitting a code before one was requested
    #[error("{event} can't be handled while {phase:?}")]
    UnexpectedEvent {
        /// Phase at the time of dispatch
        phase: FlowPhase,
        /// Name of the refused event
        event: &'static str,
    },
    /// The verify request names another address than the one the code was sent to
    #[error("code was sent to {expected}, not {submitted}")]
    EmailMismatch {
        /// The stored address
        expected: String,
        /// The address in the refused request
        submitted: String,
    },
}

/// Whether a submission is waiting on the provider.
///
/// Clones share the flag, so it can be watched while
/// [`FlowController::dispatch`] holds the controller.
#[derive(Clone, Debug, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    /// The current value
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn raise(&self) -> LoadingGuard<'_> {
        self.0.store(true, Ordering::SeqCst);
        LoadingGuard(self)
    }
}

/// Lowers the flag when the call completes or its future is dropped
struct LoadingGuard<'a>(&'a LoadingFlag);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0 .0.store(false, Ordering::SeqCst);
    }
}

/// Owns the session state and decides which form to show.
///
/// The presentation layer renders based on [`current_state`](Self::current_state),
/// forwards submissions through [`dispatch`](Self::dispatch) and shows whatever
/// [`take_notification`](Self::take_notification) hands out.
#[derive(Debug)]
pub struct FlowController<T> {
    transport: T,
    state: FlowState,
    loading: LoadingFlag,
    notification: Option<Notification>,
}

impl<T: OtpTransport> FlowController<T> {
    /// Start a fresh session on the generate form
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: FlowState::default(),
            loading: LoadingFlag::default(),
            notification: None,
        }
    }

    /// Start on the verify form for a code that was already sent to `email`
    pub fn resume(transport: T, email: impl Into<String>) -> Self {
        Self {
            state: FlowState {
                email: email.into(),
                code_generated: true,
            },
            ..Self::new(transport)
        }
    }

    /// The phase the presentation layer should render
    pub fn current_state(&self) -> FlowPhase {
        if self.state.code_generated {
            FlowPhase::Verifying
        } else {
            FlowPhase::Collecting
        }
    }

    /// The full session state
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Whether a submission is waiting on the provider
    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// A handle on the loading flag that stays readable during [`dispatch`](Self::dispatch)
    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    /// The transport the controller talks through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Hand out the outcome of the last submission, clearing it
    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    /// A verify form for `code`, addressed to the stored email
    pub fn verify_form(&self, code: impl Into<String>) -> VerifyForm {
        VerifyForm {
            email: self.state.email.clone(),
            code: code.into(),
        }
    }

    /// Handle a submission, returning the phase afterwards.
    ///
    /// Failed provider calls are not errors here: they leave the phase as it
    /// was and raise an error notification. `Err` means the event was refused
    /// before anything was sent.
    pub async fn dispatch(&mut self, event: FlowEvent) -> Result<FlowPhase, FlowError> {
        let phase = self.current_state();
        match (phase, event) {
            (FlowPhase::Collecting, FlowEvent::SubmitProfile(request)) => {
                self.request_code(request).await;
            }
            (FlowPhase::Verifying, FlowEvent::SubmitCode(request)) => {
                if request.email != self.state.email {
                    return Err(FlowError::EmailMismatch {
                        expected: self.state.email.clone(),
                        submitted: request.email,
                    });
                }
                self.verify_code(request).await;
            }
            (phase, event) => {
                tracing::debug!(?phase, event = event.name(), "Refusing event");
                return Err(FlowError::UnexpectedEvent {
                    phase,
                    event: event.name(),
                });
            }
        }
        Ok(self.current_state())
    }

    async fn request_code(&mut self, request: GenerateRequest) {
        tracing::info!(email = %request.email, code_type = %request.code_type, "Requesting code");

        let result = {
            let _loading = self.loading.raise();
            self.transport.request_code(&request).await
        };

        match result {
            Ok(ack) => {
                tracing::info!(?ack, "Code requested, switching to verification");
                self.state.email = request.email;
                self.state.code_generated = true;
                self.notification = Some(Notification::CODE_SENT);
            }
            Err(e) => {
                tracing::warn!(%e, "Failed to request code");
                self.notification = Some(Notification::CODE_REQUEST_FAILED);
            }
        }
    }

    async fn verify_code(&mut self, request: VerifyRequest) {
        tracing::info!(email = %request.email, "Verifying code");

        let result = {
            let _loading = self.loading.raise();
            self.transport.verify_code(&request).await
        };

        match result {
            Ok(ack) => {
                tracing::info!(?ack, "Code verified, back to collecting");
                self.state.code_generated = false;
                self.notification = Some(Notification::CODE_VERIFIED);
            }
            Err(e) => {
                tracing::warn!(%e, "Failed to verify code");
                self.notification = Some(Notification::CODE_INVALID);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::CodeType,
        test_utils::TestOtpTransport,
        validation::{GenerateForm, CODE_LENGTH},
    };
    use assert_matches::assert_matches;
    use testresult::TestResult;

    fn profile(email: &str) -> GenerateRequest {
        GenerateRequest {
            email: email.to_string(),
            code_type: CodeType::Numeric,
            organization: "Acme".to_string(),
            subject: "Login".to_string(),
        }
    }

    #[test]
    fn test_initial_state() {
        let flow = FlowController::new(TestOtpTransport::default());
        assert_eq!(flow.current_state(), FlowPhase::Collecting);
        assert_eq!(flow.state(), &FlowState::default());
        assert!(!flow.is_loading());
    }

    #[test_log::test(tokio::test)]
    async fn test_request_code_switches_to_verifying() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::new(transport.clone());

        let form = GenerateForm {
            email: "a@b.com".to_string(),
            code_type: "numeric".to_string(),
            organization: "Acme".to_string(),
            subject: "Login".to_string(),
        };
        let phase = flow
            .dispatch(FlowEvent::SubmitProfile(form.submit()?))
            .await?;

        assert_eq!(phase, FlowPhase::Verifying);
        assert_eq!(flow.state().email, "a@b.com");
        assert!(!flow.is_loading());
        assert_eq!(flow.take_notification(), Some(Notification::CODE_SENT));
        assert_eq!(flow.take_notification(), None);
        assert_eq!(transport.generate_calls(), vec![profile("a@b.com")]);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_loading_while_transport_call_runs() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::new(transport.clone());
        transport.watch_loading(flow.loading_flag());

        flow.dispatch(FlowEvent::SubmitProfile(profile("a@b.com")))
            .await?;
        assert!(!flow.is_loading());

        transport.set_offline(true);
        let request = flow.verify_form("123456").submit()?;
        flow.dispatch(FlowEvent::SubmitCode(request)).await?;
        assert!(!flow.is_loading());

        assert_eq!(transport.loading_seen(), vec![true, true]);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_refused_event_never_raises_loading() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::resume(transport.clone(), "a@b.com");
        transport.watch_loading(flow.loading_flag());

        let result = flow
            .dispatch(FlowEvent::SubmitProfile(profile("a@b.com")))
            .await;

        assert_matches!(result, Err(FlowError::UnexpectedEvent { .. }));
        assert!(transport.loading_seen().is_empty());
        assert!(!flow.is_loading());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_request_keeps_collecting() -> TestResult {
        let transport = TestOtpTransport::default();
        transport.set_offline(true);
        let mut flow = FlowController::new(transport.clone());

        let phase = flow
            .dispatch(FlowEvent::SubmitProfile(profile("a@b.com")))
            .await?;

        assert_eq!(phase, FlowPhase::Collecting);
        assert_eq!(flow.state().email, "");
        assert!(!flow.is_loading());
        assert_eq!(
            flow.take_notification(),
            Some(Notification::CODE_REQUEST_FAILED)
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_request_keeps_previous_email() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::new(transport.clone());

        flow.dispatch(FlowEvent::SubmitProfile(profile("first@b.com")))
            .await?;
        let code = transport.code_for("first@b.com").unwrap();
        flow.dispatch(FlowEvent::SubmitCode(flow.verify_form(code).submit()?))
            .await?;
        assert_eq!(flow.current_state(), FlowPhase::Collecting);

        transport.set_offline(true);
        flow.dispatch(FlowEvent::SubmitProfile(profile("second@b.com")))
            .await?;

        assert_eq!(flow.current_state(), FlowPhase::Collecting);
        assert_eq!(flow.state().email, "first@b.com");

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_verify_returns_to_collecting() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::new(transport.clone());

        flow.dispatch(FlowEvent::SubmitProfile(profile("a@b.com")))
            .await?;
        flow.take_notification();

        let code = transport.code_for("a@b.com").unwrap();
        let request = flow.verify_form(code).submit()?;
        let phase = flow.dispatch(FlowEvent::SubmitCode(request)).await?;

        assert_eq!(phase, FlowPhase::Collecting);
        assert_eq!(flow.state().email, "a@b.com");
        assert!(!flow.state().code_generated);
        assert_eq!(flow.take_notification(), Some(Notification::CODE_VERIFIED));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_wrong_code_allows_resubmission() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::new(transport.clone());

        flow.dispatch(FlowEvent::SubmitProfile(profile("a@b.com")))
            .await?;

        let wrong = flow.verify_form("000000").submit()?;
        let phase = flow.dispatch(FlowEvent::SubmitCode(wrong)).await?;
        assert_eq!(phase, FlowPhase::Verifying);
        assert_eq!(flow.take_notification(), Some(Notification::CODE_INVALID));

        let right = flow.verify_form("123456").submit()?;
        let phase = flow.dispatch(FlowEvent::SubmitCode(right)).await?;
        assert_eq!(phase, FlowPhase::Collecting);

        let emails = transport
            .verify_calls()
            .into_iter()
            .map(|call| call.email)
            .collect::<Vec<_>>();
        assert_eq!(emails, vec!["a@b.com", "a@b.com"]);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_short_code_never_reaches_transport() -> TestResult {
        let transport = TestOtpTransport::default();
        let flow = FlowController::resume(transport.clone(), "a@b.com");

        let errors = flow.verify_form("12345").submit().unwrap_err();

        assert_eq!(errors.get("code"), Some(CODE_LENGTH));
        assert_eq!(transport.call_count(), 0);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_code_before_request_is_refused() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::new(transport.clone());

        let result = flow
            .dispatch(FlowEvent::SubmitCode(VerifyRequest {
                email: "a@b.com".to_string(),
                otp: "123456".to_string(),
            }))
            .await;

        assert_matches!(
            result,
            Err(FlowError::UnexpectedEvent {
                phase: FlowPhase::Collecting,
                ..
            })
        );
        assert_eq!(transport.call_count(), 0);
        assert_eq!(flow.take_notification(), None);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_profile_while_verifying_is_refused() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::resume(transport.clone(), "a@b.com");

        let result = flow
            .dispatch(FlowEvent::SubmitProfile(profile("other@b.com")))
            .await;

        assert_matches!(result, Err(FlowError::UnexpectedEvent { .. }));
        assert_eq!(flow.state().email, "a@b.com");
        assert_eq!(transport.call_count(), 0);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_code_for_other_email_is_refused() -> TestResult {
        let transport = TestOtpTransport::default();
        let mut flow = FlowController::resume(transport.clone(), "a@b.com");

        let result = flow
            .dispatch(FlowEvent::SubmitCode(VerifyRequest {
                email: "other@b.com".to_string(),
                otp: "123456".to_string(),
            }))
            .await;

        assert_matches!(result, Err(FlowError::EmailMismatch { expected, .. }) if expected == "a@b.com");
        assert_eq!(transport.call_count(), 0);

        Ok(())
    }
}
