//! Built-in resolvers (spec §4.9): registry, DNS, local, GitHub, HTTP(S).

pub mod dns;
pub mod github;
pub mod http;
pub mod http_client;
pub mod local;
pub mod registry_resolver;

pub use dns::{DnsResolver, DnsTxtLookup};
pub use github::GithubResolver;
pub use http::HttpResolver;
pub use http_client::{AllowList, HttpClient, ReqwestHttpClient};
pub use local::{LocalFileSource, LocalResolver};
pub use registry_resolver::RegistryResolver;
