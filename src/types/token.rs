/// Opaque token/coin identifier. The engine never inspects a token's
/// metadata or calls into user-supplied code for it; it is only ever
/// compared and used as a map/bag key.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(pub [u8; 32]);

impl TokenId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
