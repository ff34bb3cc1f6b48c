//! Pairing PIN generation

use uuid::Uuid;

/// Source of pairing codes for new leases
pub trait PinGenerator: Send + Sync {
    /// Produce a fresh pairing code
    fn generate(&self) -> String;
}

/// Four-digit PINs drawn from v4 UUID randomness
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPinGenerator;

impl PinGenerator for RandomPinGenerator {
    fn generate(&self) -> String {
        let bits = Uuid::new_v4().as_u128();
        (1000 + bits % 9000).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_pin_shape() {
        let generator = RandomPinGenerator;
        for _ in 0..1000 {
            let pin = generator.generate();
            assert_eq!(pin.len(), 4);
            let value: u32 = pin.parse().unwrap();
            assert!((1000..=9999).contains(&value));
        }
    }

    #[test]
    fn test_random_pin_varies() {
        let generator = RandomPinGenerator;
        let pins: std::collections::HashSet<String> =
            (0..100).map(|_| generator.generate()).collect();
        assert!(pins.len() > 1);
    }
}
