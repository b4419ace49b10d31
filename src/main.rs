// This binary crate is intentionally minimal.
// All neural network logic lives in the library (src/lib.rs and its modules).
// Run the demo with:
//   cargo run --example convnet
fn main() {
    println!("magnetite: a from-scratch convolutional neural network library in Rust.");
    println!("Run `cargo run --example convnet` to train a small CNN on synthetic data.");
}
