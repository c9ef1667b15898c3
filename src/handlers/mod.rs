// Handlers split by security tier:
// public (no auth, or its own shared secret) and protected (JWT + clinic profile).
pub mod protected;
pub mod public;
