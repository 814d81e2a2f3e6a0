pub mod bar;
pub mod bar_series;
pub mod envelope;
pub mod instrument;
pub mod interval;
mod lenient;
pub mod request_params;
pub mod session;
