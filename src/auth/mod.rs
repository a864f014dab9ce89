//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod permission_gate;

pub use jwt::{Claims, JwtService, SessionSubject};
pub use middleware::{extract_session_cookie, extract_token, session_middleware};
pub use password::PasswordHasher;
pub use permission_gate::{permission_gate_middleware, GateOutcome};
