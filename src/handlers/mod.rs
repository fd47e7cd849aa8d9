// Two tiers: public (no token) and protected (JWT via jwt_auth_middleware)
pub mod protected;
pub mod public;
