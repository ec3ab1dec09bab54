//! Method-name routing of JSON-RPC messages
//!
//! Handlers receive the session state, the outbound [`Client`] and their
//! decoded params. Every request is answered exactly once; notification
//! failures are only logged.

use std::collections::HashMap;

use indexmap::IndexMap;
use lsp_types::notification::Notification;
use lsp_types::request::Request;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::lsp::client::Client;
use crate::lsp::message::{Message, Response, ResponseError};

/// Counter key for responses the client sent to us
pub const RESPONSE_COUNTER: &str = "<response>";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("a request handler for {0} is already registered")]
    DuplicateRequest(String),

    #[error("a notification handler for {0} is already registered")]
    DuplicateNotification(String),
}

type RequestHandler<S> = Box<dyn Fn(&mut S, &mut Client, Value) -> Result<Value, ResponseError>>;
type NotificationHandler<S> = Box<dyn Fn(&mut S, &mut Client, Value) -> Result<(), ResponseError>>;

pub struct Dispatcher<S> {
    request_handlers: HashMap<String, RequestHandler<S>>,
    notification_handlers: HashMap<String, NotificationHandler<S>>,
    counters: IndexMap<String, u64>,
}

impl<S: 'static> Default for Dispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> Dispatcher<S> {
    pub fn new() -> Self {
        Self {
            request_handlers: HashMap::new(),
            notification_handlers: HashMap::new(),
            counters: IndexMap::new(),
        }
    }

    /// Registers the handler of request type `R`
    pub fn add_request_handler<R, F>(&mut self, handler: F) -> Result<(), RegistrationError>
    where
        R: Request + 'static,
        F: Fn(&mut S, &mut Client, R::Params) -> Result<R::Result, ResponseError> + 'static,
    {
        self.add_raw_request_handler(R::METHOD, move |state, client, params| {
            let params = decode_params::<R::Params>(R::METHOD, params)?;
            let result = handler(state, client, params)?;
            serde_json::to_value(result).map_err(|e| ResponseError::internal_error(e.to_string()))
        })
    }

    /// Registers the handler of notification type `N`
    pub fn add_notification_handler<N, F>(&mut self, handler: F) -> Result<(), RegistrationError>
    where
        N: Notification + 'static,
        F: Fn(&mut S, &mut Client, N::Params) -> Result<(), ResponseError> + 'static,
    {
        self.add_raw_notification_handler(N::METHOD, move |state, client, params| {
            let params = decode_params::<N::Params>(N::METHOD, params)?;
            handler(state, client, params)
        })
    }

    /// Registers a handler working on undecoded params
    pub fn add_raw_request_handler<F>(&mut self, method: &str, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut S, &mut Client, Value) -> Result<Value, ResponseError> + 'static,
    {
        if self.request_handlers.contains_key(method) {
            return Err(RegistrationError::DuplicateRequest(method.to_string()));
        }
        self.request_handlers
            .insert(method.to_string(), Box::new(handler));
        Ok(())
    }

    pub fn add_raw_notification_handler<F>(
        &mut self,
        method: &str,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&mut S, &mut Client, Value) -> Result<(), ResponseError> + 'static,
    {
        if self.notification_handlers.contains_key(method) {
            return Err(RegistrationError::DuplicateNotification(method.to_string()));
        }
        self.notification_handlers
            .insert(method.to_string(), Box::new(handler));
        Ok(())
    }

    /// Decodes `body` and runs the matching handler to completion. Request
    /// results and errors are written to `client` before this returns.
    pub fn dispatch_message(&mut self, state: &mut S, client: &mut Client, body: &[u8]) {
        let message = match Message::parse(body) {
            Ok(message) => message,
            Err(rejection) => {
                warn!("Rejected message: {}", rejection.error);
                if let Some(id) = rejection.reply_to {
                    client.send_response(&Response::error(id, rejection.error));
                }
                return;
            }
        };

        match message {
            Message::Request(request) => {
                self.count(&request.method);
                debug!("Request {} ({})", request.method, request.id);
                let outcome = match self.request_handlers.get(&request.method) {
                    Some(handler) => handler(state, client, request.params),
                    None => Err(ResponseError::method_not_found(&request.method)),
                };
                let response = match outcome {
                    Ok(result) => Response::result(request.id, result),
                    Err(error) => {
                        debug!("Request {} failed: {}", request.method, error);
                        Response::error(request.id, error)
                    }
                };
                client.send_response(&response);
            }
            Message::Notification(notification) => {
                self.count(&notification.method);
                debug!("Notification {}", notification.method);
                match self.notification_handlers.get(&notification.method) {
                    Some(handler) => {
                        if let Err(error) = handler(state, client, notification.params) {
                            warn!("Notification {} failed: {}", notification.method, error);
                        }
                    }
                    None if notification.method.starts_with("$/") => {
                        debug!("Ignoring optional notification {}", notification.method);
                    }
                    None => warn!("No handler for notification {}", notification.method),
                }
            }
            Message::Response(response) => {
                self.count(RESPONSE_COUNTER);
                debug!(
                    "Received response to {} ({})",
                    response.id,
                    if response.is_error() { "error" } else { "ok" }
                );
            }
        }
    }

    /// Messages dispatched per method, in first-seen order
    pub fn stat_counters(&self) -> &IndexMap<String, u64> {
        &self.counters
    }

    fn count(&mut self, method: &str) {
        match self.counters.get_mut(method) {
            Some(count) => *count += 1,
            None => {
                self.counters.insert(method.to_string(), 1);
            }
        }
    }
}

fn decode_params<P: serde::de::DeserializeOwned>(method: &str, params: Value) -> Result<P, ResponseError> {
    serde_json::from_value(params)
        .map_err(|e| ResponseError::invalid_params(format!("invalid params for {}: {}", method, e)))
}
