//! # SHAKE Extendable-Output Hash
//!
//! Incremental SHAKE128/SHAKE256 (FIPS 202) over the `sha3` sponge.
//!
//! A [`ShakeContext`] moves through two phases:
//!
//! - **Absorbing** - after [`ShakeContext::new`] or [`ShakeContext::init`];
//!   [`ShakeContext::update`] may be called any number of times and chunk
//!   boundaries do not affect the digest.
//! - **Squeezing** - entered by the first [`ShakeContext::out`] or
//!   [`ShakeContext::squeeze`]; further calls continue the output stream.
//!   Absorbing is rejected with [`ShakeError::UpdateAfterSqueeze`].

use serde::Deserialize;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Shake128, Shake128Reader, Shake256, Shake256Reader};
use thiserror::Error;

/// Errors raised by [`ShakeContext`]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShakeError {
    /// `update` called after output extraction started
    #[error("cannot absorb data after output extraction has begun")]
    UpdateAfterSqueeze,

    /// Output length of zero
    #[error("output length must be greater than 0")]
    InvalidOutputLength,

    /// `out` buffer shorter than the configured output length
    #[error("output buffer holds {actual} bytes, {required} required")]
    OutputBufferTooSmall { required: usize, actual: usize },
}

/// SHAKE instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShakeVariant {
    Shake128,
    Shake256,
}

impl ShakeVariant {
    /// Sponge rate in bytes
    pub const fn rate(self) -> usize {
        match self {
            ShakeVariant::Shake128 => 168,
            ShakeVariant::Shake256 => 136,
        }
    }
}

/// Context phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShakePhase {
    Absorbing,
    Squeezing,
}

/// Hasher accepting input
#[derive(Clone)]
enum Sponge {
    Shake128(Shake128),
    Shake256(Shake256),
}

impl Sponge {
    fn new(variant: ShakeVariant) -> Self {
        match variant {
            ShakeVariant::Shake128 => Sponge::Shake128(Shake128::default()),
            ShakeVariant::Shake256 => Sponge::Shake256(Shake256::default()),
        }
    }

    fn absorb(&mut self, data: &[u8]) {
        match self {
            Sponge::Shake128(hasher) => hasher.update(data),
            Sponge::Shake256(hasher) => hasher.update(data),
        }
    }

    fn finalize(self) -> Reader {
        match self {
            Sponge::Shake128(hasher) => Reader::Shake128(hasher.finalize_xof()),
            Sponge::Shake256(hasher) => Reader::Shake256(hasher.finalize_xof()),
        }
    }
}

/// Padded sponge producing output
#[derive(Clone)]
enum Reader {
    Shake128(Shake128Reader),
    Shake256(Shake256Reader),
}

impl Reader {
    fn read(&mut self, output: &mut [u8]) {
        match self {
            Reader::Shake128(reader) => reader.read(output),
            Reader::Shake256(reader) => reader.read(output),
        }
    }
}

#[derive(Clone)]
enum State {
    Absorbing(Sponge),
    Squeezing(Reader),
}

/// Incremental SHAKE context
///
/// # Examples
///
/// ```
/// use obc_comms::shake::{ShakeContext, ShakeVariant};
///
/// let mut ctx = ShakeContext::new(ShakeVariant::Shake128, 32)?;
/// ctx.update(b"The quick brown fox ")?;
/// ctx.update(b"jumps over the lazy dog")?;
///
/// let mut digest = [0u8; 32];
/// ctx.out(&mut digest)?;
/// assert_eq!(digest[..4], [0xF4, 0x20, 0x2E, 0x3C]);
/// # Ok::<(), obc_comms::shake::ShakeError>(())
/// ```
#[derive(Clone)]
pub struct ShakeContext {
    variant: ShakeVariant,
    output_length: usize,
    state: State,
}

impl std::fmt::Debug for ShakeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShakeContext")
            .field("variant", &self.variant)
            .field("output_length", &self.output_length)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl ShakeContext {
    /// Create a context producing `output_length` bytes per [`out`](Self::out) call
    ///
    /// # Errors
    ///
    /// [`ShakeError::InvalidOutputLength`] if `output_length` is zero.
    pub fn new(variant: ShakeVariant, output_length: usize) -> Result<Self, ShakeError> {
        let mut ctx = Self {
            variant,
            output_length: 0,
            state: State::Absorbing(Sponge::new(variant)),
        };
        ctx.init(output_length)?;
        Ok(ctx)
    }

    /// Reset the context and fix a new output length
    ///
    /// On error the context is left untouched.
    pub fn init(&mut self, output_length: usize) -> Result<(), ShakeError> {
        if output_length == 0 {
            return Err(ShakeError::InvalidOutputLength);
        }

        self.state = State::Absorbing(Sponge::new(self.variant));
        self.output_length = output_length;
        Ok(())
    }

    pub fn variant(&self) -> ShakeVariant {
        self.variant
    }

    pub fn output_length(&self) -> usize {
        self.output_length
    }

    pub fn phase(&self) -> ShakePhase {
        match self.state {
            State::Absorbing(_) => ShakePhase::Absorbing,
            State::Squeezing(_) => ShakePhase::Squeezing,
        }
    }

    /// Absorb the next chunk of the input stream
    ///
    /// # Errors
    ///
    /// [`ShakeError::UpdateAfterSqueeze`] once extraction has begun. The
    /// context state is not modified in that case.
    pub fn update(&mut self, data: &[u8]) -> Result<(), ShakeError> {
        match &mut self.state {
            State::Absorbing(sponge) => {
                sponge.absorb(data);
                Ok(())
            }
            State::Squeezing(_) => Err(ShakeError::UpdateAfterSqueeze),
        }
    }

    /// Write the next `output_length` bytes of output into `output`
    ///
    /// Only the first `output_length` bytes of `output` are written. Repeated
    /// calls continue the output stream.
    ///
    /// # Errors
    ///
    /// [`ShakeError::OutputBufferTooSmall`] if `output` is shorter than the
    /// configured output length; nothing is extracted in that case.
    pub fn out(&mut self, output: &mut [u8]) -> Result<(), ShakeError> {
        if output.len() < self.output_length {
            return Err(ShakeError::OutputBufferTooSmall {
                required: self.output_length,
                actual: output.len(),
            });
        }

        let len = self.output_length;
        self.squeeze(&mut output[..len]);
        Ok(())
    }

    /// Extract `output.len()` bytes, independent of the configured output length
    pub fn squeeze(&mut self, output: &mut [u8]) {
        let fresh = State::Absorbing(Sponge::new(self.variant));
        let mut reader = match std::mem::replace(&mut self.state, fresh) {
            State::Absorbing(sponge) => sponge.finalize(),
            State::Squeezing(reader) => reader,
        };
        reader.read(output);
        self.state = State::Squeezing(reader);
    }
}

fn one_shot(variant: ShakeVariant, data: &[u8], output_length: usize) -> Vec<u8> {
    let mut output = vec![0u8; output_length];
    let mut sponge = Sponge::new(variant);
    sponge.absorb(data);
    sponge.finalize().read(&mut output);
    output
}

/// SHAKE128 of `data`, `output_length` bytes
pub fn shake128(data: &[u8], output_length: usize) -> Vec<u8> {
    one_shot(ShakeVariant::Shake128, data, output_length)
}

/// SHAKE256 of `data`, `output_length` bytes
pub fn shake256(data: &[u8], output_length: usize) -> Vec<u8> {
    one_shot(ShakeVariant::Shake256, data, output_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

    fn reference(variant: ShakeVariant, data: &[u8], len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        match variant {
            ShakeVariant::Shake128 => {
                let mut hasher = sha3::Shake128::default();
                hasher.update(data);
                hasher.finalize_xof().read(&mut out);
            }
            ShakeVariant::Shake256 => {
                let mut hasher = sha3::Shake256::default();
                hasher.update(data);
                hasher.finalize_xof().read(&mut out);
            }
        }
        out
    }

    fn digest(variant: ShakeVariant, chunks: &[&[u8]], len: usize) -> Vec<u8> {
        let mut ctx = ShakeContext::new(variant, len).unwrap();
        for chunk in chunks {
            ctx.update(chunk).unwrap();
        }
        let mut out = vec![0u8; len];
        ctx.out(&mut out).unwrap();
        out
    }

    #[test]
    fn test_published_digests() {
        assert_eq!(
            hex::encode(digest(ShakeVariant::Shake128, &[], 32)),
            "7f9c2ba4e88f827d616045507605853ed73b8093f6efbc88eb1a6eacfa66ef26"
        );
        assert_eq!(
            hex::encode(digest(ShakeVariant::Shake256, &[], 64)),
            "46b9dd2b0ba88d13233b3feb743eeb243fcd52ea62b81b82b50c27646ed5762f\
             d75dc4ddd8c0f200cb05019d67b592f6fc821c49479ab48640292eacb3b7c4be"
        );
        assert_eq!(
            hex::encode(digest(ShakeVariant::Shake128, &[FOX], 32)),
            "f4202e3c5852f9182a0430fd8144f0a74b95e7417ecae17db0f8cfeed0e3e66e"
        );
        assert_eq!(
            hex::encode(digest(ShakeVariant::Shake128, &[b"The quick brown fox jumps over the lazy dof"], 32)),
            "853f4538be0db9621a6cea659a06c1107b1f83f02b13d18297bd39d7411cf10c"
        );
    }

    #[test]
    fn test_chunking_independence() {
        let whole = digest(ShakeVariant::Shake128, &[FOX], 32);
        let split = digest(ShakeVariant::Shake128, &[&FOX[..10], &FOX[10..]], 32);
        let bytewise: Vec<&[u8]> = FOX.chunks(1).collect();
        let bytewise = digest(ShakeVariant::Shake128, &bytewise, 32);
        assert_eq!(whole, split);
        assert_eq!(whole, bytewise);
    }

    #[test]
    fn test_matches_reference_across_rate_boundaries() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 + 3) as u8).collect();
        for variant in [ShakeVariant::Shake128, ShakeVariant::Shake256] {
            let rate = variant.rate();
            for len in [0, 1, rate - 1, rate, rate + 1, 2 * rate, 999] {
                let ours = digest(variant, &[&data[..len]], 48);
                assert_eq!(ours, reference(variant, &data[..len], 48), "{:?} len {}", variant, len);
            }
        }
    }

    #[test]
    fn test_repeated_out_continues_stream() {
        let mut ctx = ShakeContext::new(ShakeVariant::Shake256, 100).unwrap();
        ctx.update(FOX).unwrap();

        let mut first = [0u8; 100];
        let mut second = [0u8; 100];
        ctx.out(&mut first).unwrap();
        ctx.out(&mut second).unwrap();

        let expected = reference(ShakeVariant::Shake256, FOX, 200);
        assert_eq!(&first[..], &expected[..100]);
        assert_eq!(&second[..], &expected[100..]);
    }

    #[test]
    fn test_squeeze_beyond_output_length() {
        let mut ctx = ShakeContext::new(ShakeVariant::Shake128, 16).unwrap();
        ctx.update(FOX).unwrap();
        let mut long = vec![0u8; 500];
        ctx.squeeze(&mut long);
        assert_eq!(long, reference(ShakeVariant::Shake128, FOX, 500));
    }

    #[test]
    fn test_update_after_squeeze_is_rejected() {
        let mut ctx = ShakeContext::new(ShakeVariant::Shake128, 32).unwrap();
        ctx.update(b"abc").unwrap();
        let mut out = [0u8; 32];
        ctx.out(&mut out).unwrap();
        assert_eq!(ctx.phase(), ShakePhase::Squeezing);

        assert_eq!(ctx.update(b"more"), Err(ShakeError::UpdateAfterSqueeze));

        // Rejected update must not disturb the output stream
        let mut next = [0u8; 32];
        ctx.out(&mut next).unwrap();
        let expected = reference(ShakeVariant::Shake128, b"abc", 64);
        assert_eq!(&next[..], &expected[32..]);
    }

    #[test]
    fn test_cloned_context_continues_independently() {
        let mut ctx = ShakeContext::new(ShakeVariant::Shake256, 40).unwrap();
        ctx.update(&FOX[..20]).unwrap();
        let mut absorbing = ctx.clone();

        ctx.update(&FOX[20..]).unwrap();
        absorbing.update(&FOX[20..]).unwrap();

        let mut first = [0u8; 40];
        ctx.out(&mut first).unwrap();
        let mut squeezing = ctx.clone();
        assert_eq!(squeezing.phase(), ShakePhase::Squeezing);

        let mut second = [0u8; 40];
        let mut forked = [0u8; 40];
        ctx.out(&mut second).unwrap();
        squeezing.out(&mut forked).unwrap();
        assert_eq!(second, forked);

        let mut restarted = [0u8; 40];
        absorbing.out(&mut restarted).unwrap();
        assert_eq!(restarted, first);
        assert_eq!([first, second].concat(), reference(ShakeVariant::Shake256, FOX, 80));
    }

    #[test]
    fn test_zero_output_length_rejected() {
        assert_eq!(
            ShakeContext::new(ShakeVariant::Shake128, 0).unwrap_err(),
            ShakeError::InvalidOutputLength
        );
    }

    #[test]
    fn test_out_buffer_too_small() {
        let mut ctx = ShakeContext::new(ShakeVariant::Shake128, 32).unwrap();
        let mut out = [0u8; 16];
        assert_eq!(
            ctx.out(&mut out),
            Err(ShakeError::OutputBufferTooSmall { required: 32, actual: 16 })
        );
        // Still absorbing: the failed call extracted nothing
        assert_eq!(ctx.phase(), ShakePhase::Absorbing);
        ctx.update(b"late data").unwrap();
    }

    #[test]
    fn test_init_resets_context() {
        let mut ctx = ShakeContext::new(ShakeVariant::Shake128, 32).unwrap();
        ctx.update(b"discarded").unwrap();
        let mut out = [0u8; 32];
        ctx.out(&mut out).unwrap();

        ctx.init(32).unwrap();
        assert_eq!(ctx.phase(), ShakePhase::Absorbing);
        ctx.update(FOX).unwrap();
        ctx.out(&mut out).unwrap();
        assert_eq!(out.to_vec(), reference(ShakeVariant::Shake128, FOX, 32));
    }

    #[test]
    fn test_one_shot_helpers() {
        assert_eq!(shake128(FOX, 32), reference(ShakeVariant::Shake128, FOX, 32));
        assert_eq!(shake256(FOX, 64), reference(ShakeVariant::Shake256, FOX, 64));
        assert!(shake128(FOX, 0).is_empty());
    }

    #[test]
    fn test_variant_from_config_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            variant: ShakeVariant,
        }
        let parsed: Wrapper = toml::from_str("variant = \"shake256\"").unwrap();
        assert_eq!(parsed.variant, ShakeVariant::Shake256);
    }
}
