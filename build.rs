fn main() {
    // Only the device build needs the ESP-IDF environment; host tests and
    // the simulator build without it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
