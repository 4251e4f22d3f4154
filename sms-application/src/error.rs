use sms_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    /// 事件载荷无法解码，重投不会改变结果
    #[error("decode: {0}")]
    Decode(String),

    /// 同一事件正被另一次投递处理
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    /// 附带操作与标识的包装层
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AppError>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// 剥离所有 `Context` 包装层
    pub fn root(&self) -> &AppError {
        let mut current = self;
        while let AppError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        match self.root() {
            AppError::Domain(DomainError::EventHandler { source, .. }) => {
                match source.downcast_ref::<AppError>() {
                    Some(inner) => inner.is_not_found(),
                    None => source
                        .downcast_ref::<DomainError>()
                        .is_some_and(DomainError::is_not_found),
                }
            }
            AppError::Domain(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// 调用方或传输层是否应当重投
    pub fn is_retriable(&self) -> bool {
        match self.root() {
            AppError::Domain(DomainError::EventHandler { source, .. }) => {
                match source.downcast_ref::<AppError>() {
                    Some(inner) => inner.is_retriable(),
                    None => source
                        .downcast_ref::<DomainError>()
                        .is_none_or(DomainError::is_retriable),
                }
            }
            AppError::Domain(err) => err.is_retriable(),
            AppError::Conflict(_) | AppError::Cancelled(_) => true,
            _ => false,
        }
    }
}

/// 为任意可转换为 `AppError` 的结果附加操作上下文
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> AppResult<T>;

    fn with_context<F, C>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> AppResult<T> {
        self.with_context(|| context)
    }

    fn with_context<F, C>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|err| AppError::Context {
            context: f().into(),
            source: Box::new(err.into()),
        })
    }
}
