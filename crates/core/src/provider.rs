//! The provider facade and its builder.
//!
//! [`Provider`] is a cheap-clone handle. Every clone drives the same connection,
//! engine and lifecycle, so methods keep working when a clone is moved into a
//! task or a closure far from where the provider was built. The connection is
//! torn down when the last clone is dropped.
//!
//! # Wiring
//!
//! ```text
//! Provider::request ─► RpcEngine ─► StreamBridge ─► SubChannel("provider") ─► Multiplexer ─► transport
//!                                        ▲                                         │
//!                      notifications ◄───┴──────────── inbound frames ◄─────────────┘
//!                                                                                  │
//! lifecycle (StateMachine) ◄──────────── on_disconnect ◄──────────────────────────┘
//! ```

use std::sync::{Arc, Weak};

use inpage_protocol::{Params, Request, Response, codes, messages};
use inpage_runtime::{
	Error, LifecycleState, MethodHooksBuilder, Multiplexer, Result, RpcEngine, StateMachine, StreamBridge, SubChannel,
	TransportParts,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{Capabilities, ProviderConfig};
use crate::events::{EventBus, EventStream, EventWaiter, ProviderEvent};
use crate::state::{InitialState, ProviderState};

/// Handshake method answered by the frame with an [`InitialState`].
pub const GET_PROVIDER_STATE: &str = "wallet_getProviderState";

pub const ACCOUNTS_CHANGED: &str = "wallet_accountsChanged";
pub const CHAIN_CHANGED: &str = "wallet_chainChanged";
pub const UNLOCK_STATE_CHANGED: &str = "wallet_unlockStateChanged";

struct Lifecycle {
	machine: StateMachine,
	state: ProviderState,
}

struct ProviderInner {
	config: ProviderConfig,
	engine: RpcEngine,
	bridge: Arc<StreamBridge>,
	mux: Arc<Multiplexer>,
	lifecycle: Mutex<Lifecycle>,
	events: EventBus<ProviderEvent>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ProviderInner {
	/// Runs a disconnect through the state machine, emitting if it decides to.
	fn handle_disconnect(&self, is_recoverable: bool, message: Option<String>) {
		let decided = {
			let mut lifecycle = self.lifecycle.lock();
			if !is_recoverable {
				lifecycle.state.is_permanently_disconnected = true;
			}
			lifecycle.machine.handle_disconnect(is_recoverable, message)
		};
		if let Some(info) = decided {
			tracing::debug!(is_recoverable, code = info.code, message = %info.message, "Provider disconnected");
			self.events.emit(ProviderEvent::Disconnect(info));
		}
	}

	fn handle_notification(&self, request: Request) {
		if let Some(event) = self.apply_notification(&request) {
			self.events.emit(event);
		}
		self.events.emit(ProviderEvent::Notification(request));
	}

	/// Updates state from a wallet notification. Returns the event to emit if anything changed.
	///
	/// Events are emitted only after the lifecycle lock is released: waiter
	/// predicates run inline and may call back into the provider.
	fn apply_notification(&self, request: &Request) -> Option<ProviderEvent> {
		let params = request.params.clone().map(Params::into_value).unwrap_or(Value::Null);
		match request.method.as_str() {
			ACCOUNTS_CHANGED => {
				let Some(accounts) = parse_accounts(&params) else {
					tracing::warn!(params = %params, "Ignoring malformed accounts notification");
					return None;
				};
				let changed = self.lifecycle.lock().state.set_accounts(accounts.clone());
				changed.then_some(ProviderEvent::AccountsChanged(accounts))
			}
			CHAIN_CHANGED => {
				let Some((chain_id, network_version)) = parse_chain(&params) else {
					tracing::warn!(params = %params, "Ignoring malformed chain notification");
					return None;
				};
				let changed = self.lifecycle.lock().state.set_chain(chain_id.clone(), network_version.clone());
				changed.then_some(ProviderEvent::ChainChanged {
					chain_id,
					network_version,
				})
			}
			UNLOCK_STATE_CHANGED => {
				let Some(is_unlocked) = parse_unlocked(&params) else {
					tracing::warn!(params = %params, "Ignoring malformed unlock notification");
					return None;
				};
				let changed = self.lifecycle.lock().state.set_unlocked(is_unlocked);
				changed.then_some(ProviderEvent::UnlockStateChanged { is_unlocked })
			}
			_ => None,
		}
	}
}

impl Drop for ProviderInner {
	fn drop(&mut self) {
		self.mux.shutdown("Provider dropped");
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
	}
}

fn parse_accounts(params: &Value) -> Option<Vec<String>> {
	let list = match params {
		Value::Array(_) => params,
		Value::Object(map) => map.get("accounts")?,
		_ => return None,
	};
	serde_json::from_value(list.clone()).ok()
}

fn parse_chain(params: &Value) -> Option<(String, Option<String>)> {
	let chain_id = params.get("chainId")?.as_str()?.to_string();
	let network_version = match params.get("networkVersion") {
		Some(Value::String(version)) => Some(version.clone()),
		Some(Value::Number(version)) => Some(version.to_string()),
		_ => None,
	};
	Some((chain_id, network_version))
}

fn parse_unlocked(params: &Value) -> Option<bool> {
	match params {
		Value::Bool(flag) => Some(*flag),
		Value::Array(items) => items.first()?.as_bool(),
		Value::Object(map) => map.get("isUnlocked")?.as_bool(),
		_ => None,
	}
}

/// Turns `request(args)` input into a [`Request`], or explains what is wrong with it.
///
/// Nothing is sent for rejected input.
pub fn validate_request_args(args: &Value) -> Result<Request> {
	let Some(object) = args.as_object() else {
		return Err(Error::invalid_request(
			messages::errors::invalid_request_args(),
			Some(args.clone()),
		));
	};

	let method = match object.get("method") {
		Some(Value::String(method)) if !method.is_empty() => method.clone(),
		_ => {
			return Err(Error::invalid_request(
				messages::errors::invalid_request_method(),
				Some(args.clone()),
			));
		}
	};

	let params = match object.get("params") {
		None => None,
		Some(value @ (Value::Array(_) | Value::Object(_))) => Params::from_value(value.clone()),
		Some(_) => {
			return Err(Error::invalid_request(
				messages::errors::invalid_request_params(),
				Some(args.clone()),
			));
		}
	};

	Ok(Request::new(method, params))
}

fn parse_envelope(payload: Value) -> Result<Request> {
	serde_json::from_value(payload.clone())
		.map_err(|_| Error::invalid_request(codes::default_message(codes::INVALID_REQUEST), Some(payload)))
}

/// In-page JSON-RPC provider.
#[derive(Clone)]
pub struct Provider {
	inner: Arc<ProviderInner>,
}

impl std::fmt::Debug for Provider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Provider")
			.field("connection", self.inner.mux.descriptor())
			.field("state", &self.lifecycle())
			.finish()
	}
}

impl Provider {
	pub fn builder() -> ProviderBuilder {
		ProviderBuilder::new()
	}

	/// Builds a provider with the default configuration. Must run inside a tokio runtime.
	pub fn connect(transport: TransportParts) -> Result<Self> {
		Self::builder().build(transport)
	}

	pub fn config(&self) -> &ProviderConfig {
		&self.inner.config
	}

	pub fn capabilities(&self) -> &Capabilities {
		&self.inner.config.capabilities
	}

	/// Performs the `wallet_getProviderState` handshake and emits `connect`.
	///
	/// The handshake result seeds accounts, chain and unlock state. The provider
	/// counts as initialized afterwards even when the handshake fails.
	pub async fn initialize(&self) -> Result<()> {
		let outcome = self
			.call(GET_PROVIDER_STATE, None)
			.await
			.and_then(|value| serde_json::from_value::<InitialState>(value).map_err(Error::from));

		let connected = {
			let mut lifecycle = self.inner.lifecycle.lock();
			lifecycle.state.initialized = true;
			match &outcome {
				Ok(initial) => {
					lifecycle.state.apply_initial(initial);
					lifecycle.machine.handle_connect(&initial.chain_id)
				}
				Err(_) => None,
			}
		};

		match outcome {
			Ok(_) => {
				if let Some(info) = connected {
					self.inner.events.emit(ProviderEvent::Connect {
						chain_id: info.chain_id,
					});
				}
				Ok(())
			}
			Err(error) => {
				tracing::error!(%error, "Failed to get initial provider state");
				Err(error)
			}
		}
	}

	/// Sends `{ method, params }` and resolves with the result.
	///
	/// `args` must be an object with a non-empty string `method` and, if given,
	/// array or object `params`. Anything else fails with an invalid-request
	/// error before any traffic.
	pub async fn request(&self, args: Value) -> Result<Value> {
		let request = validate_request_args(&args)?;
		self.dispatch(request).await
	}

	/// Typed form of [`request`](Self::request).
	pub async fn call(&self, method: &str, params: Option<Params>) -> Result<Value> {
		if method.is_empty() {
			return Err(Error::invalid_request(messages::errors::invalid_request_method(), None));
		}
		self.dispatch(Request::new(method, params)).await
	}

	async fn dispatch(&self, request: Request) -> Result<Value> {
		let response = self.inner.engine.handle(request).await?;
		response.into_result().map_err(Error::Rpc)
	}

	/// Runs a full JSON-RPC envelope, or an array of them, through the engine.
	///
	/// Resolves with the response envelope(s). Remote errors are part of the
	/// returned envelope, not an `Err`.
	pub async fn send_async(&self, payload: Value) -> Result<Value> {
		match payload {
			Value::Array(items) => {
				let requests = items.into_iter().map(parse_envelope).collect::<Result<Vec<_>>>()?;
				let responses = self.send_async_batch(requests).await?;
				Ok(serde_json::to_value(responses)?)
			}
			single => {
				let response = self.inner.engine.handle(parse_envelope(single)?).await?;
				Ok(serde_json::to_value(response)?)
			}
		}
	}

	/// Callback form of [`send_async`](Self::send_async). The returned handle completes after the callback ran.
	pub fn send_async_with<F>(&self, payload: Value, callback: F) -> JoinHandle<()>
	where
		F: FnOnce(Result<Value>) + Send + 'static,
	{
		let provider = self.clone();
		tokio::spawn(async move { callback(provider.send_async(payload).await) })
	}

	/// Legacy entry point: runs `payload` and hands the outcome to `callback`.
	pub fn send<F>(&self, payload: Value, callback: F)
	where
		F: FnOnce(Result<Value>) + Send + 'static,
	{
		let _ = self.send_async_with(payload, callback);
	}

	/// Runs every request concurrently; responses come back in input order.
	pub async fn send_async_batch(&self, requests: Vec<Request>) -> Result<Vec<Response>> {
		if requests.is_empty() {
			return Err(Error::invalid_request(messages::errors::empty_batch(), None));
		}
		Ok(self.inner.engine.handle_batch(requests).await)
	}

	/// Opens another named channel over the same connection (e.g. wallet UI traffic).
	pub fn open_channel(&self, name: &str) -> Result<SubChannel> {
		self.inner.mux.create_sub_channel(name)
	}

	/// Reports a disconnect observed outside the RPC stream.
	///
	/// A terminal disconnect also rejects everything pending and closes the connection.
	pub fn notify_disconnect(&self, is_recoverable: bool, message: Option<String>) {
		self.inner.handle_disconnect(is_recoverable, message.clone());
		if !is_recoverable {
			let reason = message.unwrap_or_else(messages::errors::permanently_disconnected);
			self.inner.bridge.reject_all(&reason);
			self.inner.mux.shutdown(&reason);
		}
	}

	pub fn subscribe(&self) -> EventStream<ProviderEvent> {
		EventStream::new(self.inner.events.subscribe())
	}

	/// Resolves with the first event for which `predicate` returns true.
	///
	/// Registers immediately, so events emitted after this call are never missed.
	pub fn wait_for_event<F>(&self, predicate: F) -> EventWaiter<ProviderEvent>
	where
		F: Fn(&ProviderEvent) -> bool + Send + Sync + 'static,
	{
		EventWaiter::new(self.inner.events.register_waiter(predicate))
	}

	pub fn state(&self) -> ProviderState {
		self.inner.lifecycle.lock().state.clone()
	}

	pub fn lifecycle(&self) -> LifecycleState {
		self.inner.lifecycle.lock().machine.state()
	}

	pub fn is_connected(&self) -> bool {
		self.inner.lifecycle.lock().machine.is_connected()
	}

	pub fn chain_id(&self) -> Option<String> {
		self.inner.lifecycle.lock().state.chain_id.clone()
	}

	pub fn selected_address(&self) -> Option<String> {
		self.inner.lifecycle.lock().state.selected_address().map(str::to_string)
	}

	pub fn network_version(&self) -> Option<String> {
		self.inner.lifecycle.lock().state.network_version.clone()
	}

	pub fn pending_requests(&self) -> usize {
		self.inner.bridge.pending().len()
	}

	pub fn middleware_names(&self) -> Vec<&'static str> {
		self.inner.engine.middleware_names()
	}
}

/// Configures and wires a [`Provider`].
#[derive(Default)]
pub struct ProviderBuilder {
	config: ProviderConfig,
	hooks: MethodHooksBuilder,
}

impl ProviderBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(mut self, config: ProviderConfig) -> Self {
		self.config = config;
		self
	}

	pub fn max_event_listeners(mut self, max: usize) -> Self {
		self.config.max_event_listeners = max;
		self
	}

	pub fn json_rpc_stream_name(mut self, name: impl Into<String>) -> Self {
		self.config.json_rpc_stream_name = name.into();
		self
	}

	pub fn ignore_channel(mut self, name: impl Into<String>) -> Self {
		self.config.ignored_channels.push(name.into());
		self
	}

	pub fn logging(mut self, enabled: bool) -> Self {
		self.config.enable_logging_middleware = enabled;
		self
	}

	pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
		self.config.capabilities = capabilities;
		self
	}

	/// Mutates requests for `methods` before they leave, e.g. to attach a popup window id.
	pub fn decorate<I, S, F>(mut self, methods: I, decorate: F) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
		F: Fn(&mut Request) + Send + Sync + 'static,
	{
		self.hooks = self.hooks.decorate(methods, decorate);
		self
	}

	/// Answers `method` on the host side instead of sending it to the frame.
	pub fn intercept<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
	{
		self.hooks = self.hooks.intercept(method, handler);
		self
	}

	/// Wires the provider over `transport` and starts its background tasks.
	///
	/// Must be called inside a tokio runtime.
	pub fn build(self, transport: TransportParts) -> Result<Provider> {
		let Self { config, hooks } = self;
		config.validate()?;

		let mux = Arc::new(Multiplexer::new(transport));
		for name in &config.ignored_channels {
			mux.ignore_channel(name);
		}

		let (sender, receiver) = mux.create_sub_channel(&config.json_rpc_stream_name)?.split();
		let bridge = Arc::new(StreamBridge::new(sender));
		let engine = RpcEngine::standard(Arc::clone(&bridge), config.enable_logging_middleware, Some(hooks.build()));
		let events = EventBus::new(config.event_capacity, config.max_event_listeners);

		let inner = Arc::new(ProviderInner {
			config,
			engine,
			bridge: Arc::clone(&bridge),
			mux: Arc::clone(&mux),
			lifecycle: Mutex::new(Lifecycle {
				machine: StateMachine::new(),
				state: ProviderState::default(),
			}),
			events,
			tasks: Mutex::new(Vec::new()),
		});

		// The pump is not aborted on drop: it stops itself once the multiplexer
		// shuts down, and takes the transport tasks with it.
		spawn_pump(Arc::clone(&mux));

		let (notify_tx, notify_rx) = mpsc::unbounded_channel();
		inner.tasks.lock().extend([
			spawn_reader(Arc::clone(&bridge), receiver, notify_tx),
			spawn_notifications(Arc::downgrade(&inner), notify_rx),
		]);

		let stream_name = inner.config.json_rpc_stream_name.clone();
		let weak = Arc::downgrade(&inner);
		mux.on_disconnect(move |error| {
			let reason = messages::errors::stream_lost(&stream_name, &error.to_string());
			tracing::warn!("{reason}");
			bridge.reject_all(&reason);
			if let Some(inner) = weak.upgrade() {
				inner.handle_disconnect(false, Some(error.to_string()));
			}
		});

		tracing::debug!(
			connection = %inner.mux.descriptor(),
			middleware = ?inner.engine.middleware_names(),
			"Provider ready"
		);

		Ok(Provider { inner })
	}
}

fn spawn_pump(mux: Arc<Multiplexer>) {
	tokio::spawn(async move {
		if let Err(error) = mux.run().await {
			tracing::warn!(%error, "Connection pump failed to start");
		}
	});
}

fn spawn_reader(
	bridge: Arc<StreamBridge>,
	receiver: inpage_runtime::SubChannelReceiver,
	notifications: mpsc::UnboundedSender<Request>,
) -> JoinHandle<()> {
	tokio::spawn(async move { bridge.run(receiver, notifications).await })
}

fn spawn_notifications(inner: Weak<ProviderInner>, mut rx: mpsc::UnboundedReceiver<Request>) -> JoinHandle<()> {
	tokio::spawn(async move {
		while let Some(request) = rx.recv().await {
			let Some(inner) = inner.upgrade() else {
				break;
			};
			inner.handle_notification(request);
		}
	})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_args_must_be_an_object() {
		for args in [json!(null), json!([]), json!("eth_chainId"), json!(1)] {
			let error = validate_request_args(&args).unwrap_err();
			assert!(error.is_invalid_request(), "{args}");
			assert_eq!(error.code(), codes::INVALID_REQUEST);
		}
	}

	#[test]
	fn method_must_be_a_non_empty_string() {
		for args in [json!({}), json!({"method": ""}), json!({"method": 1})] {
			let error = validate_request_args(&args).unwrap_err();
			assert_eq!(error.to_string(), format!("Invalid request: {}", messages::errors::invalid_request_method()));
			assert_eq!(error.to_error_object().data, Some(args));
		}
	}

	#[test]
	fn params_must_be_array_or_object() {
		for params in [json!(null), json!("x"), json!(7), json!(true)] {
			let args = json!({"method": "eth_call", "params": params});
			assert!(validate_request_args(&args).unwrap_err().is_invalid_request());
		}

		let ok = validate_request_args(&json!({"method": "eth_call", "params": [1]})).unwrap();
		assert_eq!(ok.params, Some(Params::Array(vec![json!(1)])));
		assert!(ok.id.is_none());
	}

	#[test]
	fn notification_params_parse_leniently() {
		assert_eq!(parse_accounts(&json!(["0xa"])), Some(vec!["0xa".to_string()]));
		assert_eq!(parse_accounts(&json!({"accounts": []})), Some(vec![]));
		assert_eq!(parse_accounts(&json!("0xa")), None);

		assert_eq!(
			parse_chain(&json!({"chainId": "0x5", "networkVersion": 5})),
			Some(("0x5".to_string(), Some("5".to_string())))
		);
		assert_eq!(parse_chain(&json!({"networkVersion": "5"})), None);

		assert_eq!(parse_unlocked(&json!({"isUnlocked": false})), Some(false));
		assert_eq!(parse_unlocked(&json!([true])), Some(true));
	}
}
