//! Mattermost integration surface for gmeet
//!
//! - **REST host** (`client`) - [`gmeet_core::host::PluginApi`] over the Mattermost v4 API
//! - **Start requests** (`actions`) - decoding of `POST /meetings` bodies, which arrive
//!   either as a direct call or as an interactive button callback
//! - **Slash command** (`commands`) - `/gmeet`, `/gmeet settings <scheme>`, `/gmeet help`
//!
//! # Architecture
//!
//! ```text
//! HTTP body ─→ parse_start_request ─→ MeetingService ─→ RestHost ─→ Mattermost
//! /gmeet    ─→ CommandRouter ───────↗
//! ```

pub mod actions;
pub mod client;
pub mod commands;

pub use actions::{parse_start_request, PromptUpdate, RequestParseError, StartRequest};
pub use client::RestHost;
pub use commands::{CommandResponse, CommandRouter, GmeetCommand, SlashCommandPayload};
