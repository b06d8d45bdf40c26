pub mod decoder;
pub mod fetcher;
pub mod host;
pub mod renderer;
pub mod xr;

pub use decoder::*;
pub use fetcher::*;
pub use host::*;
pub use renderer::*;
pub use xr::*;
