#[macro_use]
extern crate afl;

use mrgd_rs::mzx;

fn main() {
    fuzz!(|data: &[u8]| {
        for &xor_mode in &[false, true] {
            let encoded = mzx::compress(data, xor_mode).unwrap();
            let decoded = mzx::decompress_file(&encoded, xor_mode).unwrap();

            assert_eq!(data, &decoded[..]);
        }

        // Arbitrary streams may fail, but never panic
        let _ = mzx::decompress(data, data.len() * 2, data.first().map_or(false, |b| b & 1 == 1));
    })
}
