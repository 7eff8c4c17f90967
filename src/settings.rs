/// pulse2d works in MKS units: meters, kilograms, seconds. Moving objects
/// should be in the 0.1 - 10 meter range. If your game uses different units
/// (pixels, say) scale here rather than feeding huge coordinates into the
/// solver.
pub const LENGTH_UNITS_PER_METER: f32 = 1.0;
