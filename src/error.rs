use tracing::Level;

pub use acct_api::error::{
    Detail,
    ApiErrorKind,
    ApiError,
    AuthKind,
    GeneralKind,
    SecKind,
    UserKind,
};

pub type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// the error every operation returns. `inner` is what a caller sees, the
/// context and source only ever reach the logs
#[derive(Debug)]
pub struct Error {
    inner: ApiError,
    context: Option<String>,
    src: Option<BoxDynError>,
}

pub type ApiResult<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new() -> Self {
        Error {
            inner: Default::default(),
            context: None,
            src: None,
        }
    }

    pub fn api<T>(value: T) -> Self
    where
        T: Into<ApiError>
    {
        Error {
            inner: value.into(),
            context: None,
            src: None
        }
    }

    pub fn kind<K>(mut self, kind: K) -> Self
    where
        K: Into<ApiErrorKind>
    {
        self.inner = self.inner.with_kind(kind);
        self
    }

    pub fn message<M>(mut self, msg: M) -> Self
    where
        M: Into<String>
    {
        self.inner = self.inner.with_message(msg);
        self
    }

    pub fn detail(mut self, detail: Detail) -> Self {
        self.inner = self.inner.with_detail(detail);
        self
    }

    pub fn context<C>(mut self, ctx: C) -> Self
    where
        C: Into<String>
    {
        self.context = Some(ctx.into());
        self
    }

    pub fn source<S>(mut self, src: S) -> Self
    where
        S: Into<BoxDynError>
    {
        self.src = Some(src.into());
        self
    }

    pub fn code(&self) -> &str {
        self.inner.kind().code()
    }

    pub fn as_api(&self) -> &ApiError {
        &self.inner
    }

    /// hands back the caller visible error, logging anything internal that
    /// would otherwise be lost
    pub fn into_api(self) -> ApiError {
        match (&self.context, &self.src) {
            (Some(cxt), Some(err)) => tracing::event!(
                Level::ERROR,
                code = self.code(),
                "{cxt}: {err:#?}"
            ),
            (None, Some(err)) => tracing::event!(
                Level::ERROR,
                code = self.code(),
                "unhandled error: {err:#?}"
            ),
            (Some(cxt), None) => tracing::event!(
                Level::DEBUG,
                code = self.code(),
                "{cxt}"
            ),
            (None, None) => {}
        }

        self.inner
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.inner, &self.context, &self.src) {
            (inner, Some(cxt), Some(err)) => if f.alternate() {
                write!(f, "inner: {}\ncxt: {}\nerr: {:#?}", inner, cxt, err)
            } else {
                write!(f, "inner: {}\ncxt: {}\nerr: {:?}", inner, cxt, err)
            },
            (inner, Some(cxt), None) => write!(f, "inner: {}\ncxt: {}", inner, cxt),
            (inner, None, Some(err)) => if f.alternate() {
                write!(f, "inner: {}\nerr: {:#?}", inner, err)
            } else {
                write!(f, "inner: {}\nerr: {:?}", inner, err)
            },
            (inner, None, None) => write!(f, "inner: {}", inner)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.src.as_ref().map(|v| & **v as _)
    }
}

impl From<ApiError> for Error {
    fn from(api_err: ApiError) -> Self {
        Error {
            inner: api_err,
            context: None,
            src: None,
        }
    }
}

macro_rules! kind_from {
    ($k:path) => {
        impl From<$k> for Error {
            fn from(kind: $k) -> Self {
                Error::api(kind)
            }
        }
    };
}

kind_from!(GeneralKind);
kind_from!(AuthKind);
kind_from!(SecKind);
kind_from!(UserKind);

macro_rules! simple_from {
    ($e:path) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .source(err)
            }
        }
    };
    ($e:path, $k:expr) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .kind($k)
                    .source(err)
            }
        }
    };
}

simple_from!(rand::Error);
simple_from!(handlebars::RenderError);
simple_from!(tokio::task::JoinError);
simple_from!(cron::error::Error);

// ----------------------------------------------------------------------------

pub trait Context<T, E> {
    fn kind<K>(self, kind: K) -> std::result::Result<T, Error>
    where
        K: Into<ApiErrorKind>;

    fn context<C>(self, cxt: C) -> std::result::Result<T, Error>
    where
        C: Into<String>;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<BoxDynError>
{
    fn kind<K>(self, kind: K) -> std::result::Result<T, Error>
    where
        K: Into<ApiErrorKind>
    {
        match self {
            Ok(v) => Ok(v),
            Err(err) => Err(Error::new()
                .kind(kind)
                .source(err))
        }
    }

    fn context<C>(self, cxt: C) -> std::result::Result<T, Error>
    where
        C: Into<String>
    {
        match self {
            Ok(v) => Ok(v),
            Err(err) => Err(Error::new()
                .context(cxt)
                .source(err))
        }
    }
}

impl<T> Context<T, ()> for std::option::Option<T> {
    fn kind<K>(self, kind: K) -> std::result::Result<T, Error>
    where
        K: Into<ApiErrorKind>
    {
        match self {
            Some(v) => Ok(v),
            None => Err(Error::new()
                .kind(kind))
        }
    }

    fn context<C>(self, cxt: C) -> std::result::Result<T, Error>
    where
        C: Into<String>
    {
        match self {
            Some(v) => Ok(v),
            None => Err(Error::new()
                .context(cxt))
        }
    }
}
