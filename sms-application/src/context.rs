use tokio_util::sync::CancellationToken;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用所需的横切信息：
/// - 来源标记（`source`）：发起方标识，进入日志语境；
/// - 取消信号（`cancellation`）：传入分发与重新加载等待，取消后尽快返回。
///
/// 典型用法：
/// ```rust
/// use sms_application::context::AppContext;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = AppContext::new("http-api").with_cancellation(token.child_token());
/// assert!(!ctx.is_cancelled());
/// token.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub source: String,
    pub cancellation: CancellationToken,
}

impl AppContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
