pub(crate) mod buffer;
pub(crate) mod frame;
pub(crate) mod phys;
pub(crate) mod traits;
