//! An in-memory stand-in for the remote OTP provider
use crate::{
    common::{CodeType, GenerateRequest, ServerAck, VerifyRequest},
    flow::LoadingFlag,
    traits::{OtpTransport, TransportError},
};
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Records every call and "mails" deterministic codes into an inbox.
///
/// Verification succeeds only for the last code sent to an address.
/// Cloning shares the recorded state.
#[derive(Debug, Clone, Default)]
pub struct TestOtpTransport {
    inner: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    offline: bool,
    generate_calls: Vec<GenerateRequest>,
    verify_calls: Vec<VerifyRequest>,
    inbox: HashMap<String, String>,
    loading: Option<LoadingFlag>,
    loading_seen: Vec<bool>,
}

impl State {
    fn record_loading(&mut self) {
        if let Some(flag) = &self.loading {
            let loading = flag.get();
            self.loading_seen.push(loading);
        }
    }
}

impl TestOtpTransport {
    /// Make every following call fail as if the network was down
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().unwrap().offline = offline;
    }

    /// All generate requests received so far
    pub fn generate_calls(&self) -> Vec<GenerateRequest> {
        self.inner.lock().unwrap().generate_calls.clone()
    }

    /// All verify requests received so far
    pub fn verify_calls(&self) -> Vec<VerifyRequest> {
        self.inner.lock().unwrap().verify_calls.clone()
    }

    /// Total number of calls received so far
    pub fn call_count(&self) -> usize {
        let state = self.inner.lock().unwrap();
        state.generate_calls.len() + state.verify_calls.len()
    }

    /// The code most recently mailed to `email`
    pub fn code_for(&self, email: &str) -> Option<String> {
        self.inner.lock().unwrap().inbox.get(email).cloned()
    }

    /// Record the value of `flag` at the start of every following call
    pub fn watch_loading(&self, flag: LoadingFlag) {
        self.inner.lock().unwrap().loading = Some(flag);
    }

    /// Values of the watched loading flag seen by each call, in order
    pub fn loading_seen(&self) -> Vec<bool> {
        self.inner.lock().unwrap().loading_seen.clone()
    }

    fn code_of(code_type: CodeType) -> &'static str {
        match code_type {
            CodeType::Numeric => "123456",
            CodeType::Alphanumeric => "a1b2c3",
            CodeType::Alphabetic => "abcdef",
        }
    }
}

#[async_trait]
impl OtpTransport for TestOtpTransport {
    async fn request_code(&self, request: &GenerateRequest) -> Result<ServerAck, TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.record_loading();
        state.generate_calls.push(request.clone());
        if state.offline {
            return Err(TransportError::Network(anyhow!("connection refused")));
        }

        let code = Self::code_of(request.code_type).to_string();
        state.inbox.insert(request.email.clone(), code);

        Ok(ServerAck(json!({ "message": "OTP sent" })))
    }

    async fn verify_code(&self, request: &VerifyRequest) -> Result<ServerAck, TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.record_loading();
        state.verify_calls.push(request.clone());
        if state.offline {
            return Err(TransportError::Network(anyhow!("connection refused")));
        }

        match state.inbox.get(&request.email) {
            Some(code) if code == &request.otp => {
                state.inbox.remove(&request.email);
                Ok(ServerAck(json!({ "message": "OTP verified" })))
            }
            _ => Err(TransportError::Rejected {
                status: 400,
                body: json!({ "error": "Invalid OTP" }).to_string(),
            }),
        }
    }
}
