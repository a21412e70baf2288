//! Concrete OAuth provider implementations.

pub mod google;
pub mod songkick;
pub mod spotify;

pub use google::GoogleProvider;
pub use songkick::SongkickProvider;
pub use spotify::SpotifyProvider;
