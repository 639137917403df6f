fn main() {
    // ESP-IDF link arguments are only needed for the firmware binary.
    // Host builds (tests, fuzzing) skip the ESP-IDF environment entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
