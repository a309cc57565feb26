const KB: u64 = 1 << 10;
const MB: u64 = 1 << 20;
const GB: u64 = 1 << 30;

/// Binary-unit size (`bytes`, `KB`, `MB`, `GB`) with two decimals above
/// one kilobyte.
pub fn bytes2hr(bytes: u64) -> String {
    let (unit, scale) = match bytes {
        b if b < KB => return format!("{b} bytes"),
        b if b < MB => ("KB", KB),
        b if b < GB => ("MB", MB),
        _ => ("GB", GB),
    };
    format!("{:.2} {unit}", bytes as f64 / scale as f64)
}

/// Memory taken by a bit array of `bits` bits, rounded up to whole bytes.
pub fn bits2hr(bits: u64) -> String {
    bytes2hr(bits.div_ceil(8))
}
