use serde::{Deserialize, Serialize};

/// Platform name reported by the `WeChat` mini-program runtime.
pub const WECHAT_MINI_PROGRAM: &str = "WechatMiniProgram";

/// Host environment the gateway runs in.
///
/// Only used to pick the login modal and, where the host can tell, to
/// distinguish "server unreachable" from "device offline".
pub trait Platform: Send + Sync {
    /// Platform name, also sent as the `platform` request header.
    fn name(&self) -> &str;

    /// Connectivity signal, if the host exposes one.
    fn is_online(&self) -> Option<bool> {
        None
    }
}

/// Login modal variant presented when a request needs authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthModalKind {
    WechatMiniLogin,
    SmsLogin,
}

impl AuthModalKind {
    /// Mini-program hosts get the `WeChat` login, everything else SMS login.
    #[must_use]
    pub fn for_platform(platform: &dyn Platform) -> Self {
        if platform.name() == WECHAT_MINI_PROGRAM {
            Self::WechatMiniLogin
        } else {
            Self::SmsLogin
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WechatMiniLogin => "wechatMiniLogin",
            Self::SmsLogin => "smsLogin",
        }
    }
}

/// Fixed platform description, configured once at startup.
#[derive(Debug, Clone)]
pub struct StaticPlatform {
    name: String,
    online: Option<bool>,
}

impl StaticPlatform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            online: None,
        }
    }

    /// Report a fixed connectivity state.
    #[must_use]
    pub fn with_online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }
}

impl Default for StaticPlatform {
    fn default() -> Self {
        Self::new("H5")
    }
}

impl Platform for StaticPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_online(&self) -> Option<bool> {
        self.online
    }
}
