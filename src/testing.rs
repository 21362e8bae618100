//! A [`Transport`] that replays canned responses, for tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    api::{Params, Transport, check_api_error},
    errors::{Result, WikiError},
};

#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<Params>>,
}

impl ScriptedTransport {
    pub(crate) fn new<I: IntoIterator<Item = Value>>(responses: I) -> Arc<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Parameters of every request made so far, in order.
    pub(crate) fn calls(&self) -> Vec<Params> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform_query(&self, params: &Params) -> Result<Value> {
        self.calls.lock().unwrap().push(params.clone());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| WikiError::malformed("no scripted response left"))?;
        check_api_error(response)
    }
}
