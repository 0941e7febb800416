//! In-memory [`BusSession`] that records calls and delivers fabricated signals.

use std::{
    collections::HashMap,
    future::pending,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use zbus::Message;

use super::{BusSession, MethodCall, SignalHandler, SignalRule, Subscription};
use crate::address::MPRIS_PATH;

#[derive(Default)]
struct State {
    calls: Vec<MethodCall>,
    replies: HashMap<String, Message>,
    failures: HashMap<String, String>,
    names: Vec<String>,
    handlers: Vec<(u64, SignalRule, Arc<SignalHandler>)>,
    next_handler: u64,
    hang: bool,
}

#[derive(Clone, Default)]
pub struct FakeSession {
    state: Arc<Mutex<State>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(names: &[&str]) -> Self {
        let session = Self::default();
        session.state.lock().unwrap().names = names.iter().map(|&n| n.to_owned()).collect();
        session
    }

    /// Answer every call to `member` with `body`
    pub fn reply<B>(&self, member: &str, body: &B)
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        // Only the body of a reply is ever inspected.
        let msg = Message::method_call(MPRIS_PATH, member)
            .unwrap()
            .build(body)
            .unwrap();
        self.state
            .lock()
            .unwrap()
            .replies
            .insert(member.to_owned(), msg);
    }

    /// Fail every call to `member`
    pub fn fail(&self, member: &str, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(member.to_owned(), reason.to_owned());
    }

    /// Never answer any call
    pub fn hang(&self) {
        self.state.lock().unwrap().hang = true;
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn last_call(&self) -> Option<MethodCall> {
        self.state.lock().unwrap().calls.last().cloned()
    }

    pub fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().handlers.len()
    }

    /// Deliver `msg` to every matching handler, returning how many ran
    pub fn emit(&self, msg: &Message) -> usize {
        let handlers = self
            .state
            .lock()
            .unwrap()
            .handlers
            .iter()
            .filter(|(_, rule, _)| rule.matches(msg))
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect::<Vec<_>>();
        for handler in &handlers {
            handler(msg);
        }
        handlers.len()
    }
}

#[async_trait]
impl BusSession for FakeSession {
    async fn call(&self, call: &MethodCall) -> zbus::Result<Message> {
        let (reply, failure, hang) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.clone());
            (
                state.replies.get(&call.member).cloned(),
                state.failures.get(&call.member).cloned(),
                state.hang,
            )
        };
        if hang {
            pending::<()>().await;
        }
        if let Some(reason) = failure {
            return Err(zbus::Error::Failure(reason));
        }
        match reply {
            Some(reply) => Ok(reply),
            None => Ok(Message::method_call(MPRIS_PATH, call.member.as_str())?.build(&())?),
        }
    }

    async fn list_names(&self) -> zbus::Result<Vec<String>> {
        Ok(self.state.lock().unwrap().names.clone())
    }

    async fn subscribe(
        &self,
        rule: SignalRule,
        handler: SignalHandler,
    ) -> zbus::Result<Subscription> {
        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_handler;
            state.next_handler += 1;
            state.handlers.push((id, rule.clone(), Arc::new(handler)));
            id
        };
        let state = Arc::clone(&self.state);
        Ok(Subscription::new(rule, move || {
            state
                .lock()
                .unwrap()
                .handlers
                .retain(|(handler_id, _, _)| *handler_id != id);
        }))
    }
}
