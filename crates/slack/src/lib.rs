//! Slack integration - Socket Mode event dispatch for emojibot
//!
//! - **Socket Mode** (`socket`) - WebSocket session to Slack with reconnection
//! - **Events** (`events`) - Typed lifecycle and Events API payloads
//! - **Dispatch** (`dispatch`) - Connection monitor, routing and acknowledgement
//! - **Handlers** (`handlers`) - App mention and emoji change reactions
//! - **Block Kit** (`blocks`) - Outbound message payloads
//! - **Web API** (`api`) - `chat.postMessage` client
//!
//! # Architecture
//!
//! ```text
//! SocketModeClient → SocketEvents → EventDispatcher ─ ack → SocketModeClient
//!                                        ↓ spawn
//!                                  EventHandlers → MessagingApi
//! ```

pub mod api;
pub mod blocks;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod socket;
