pub mod config;
pub mod domain;
pub mod errors;
pub mod host;
pub mod i18n;
pub mod meetings;
pub mod naming;

pub use config::{AppConfig, PluginSettings, SettingsHandle};
pub use domain::directory::{BotSpec, Channel, ChannelMember, ChannelType, Team, User};
pub use domain::meeting::{MeetingChoiceContext, MeetingRequest, StartOutcome};
pub use domain::post::{Post, MEETING_POST_TYPE};
pub use domain::user_config::{NamingScheme, UserConfig};
pub use errors::{ApplicationError, InterfaceError, MeetingError};
pub use host::{HostError, MemoryHost, PluginApi, PublishedEvent, CONFIG_CHANGE_EVENT};
pub use meetings::{MeetingService, StartIntent};
