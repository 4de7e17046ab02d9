pub mod headless;

pub use headless::launch_session;
