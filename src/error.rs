pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
pub type DynFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
