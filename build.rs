fn main() {
    // ── macOS: embed Info.plist so CoreBluetooth grants Bluetooth access ──────
    //
    // CBCentralManager stays "unauthorised" and never reports the Myo unless
    // the running binary carries an Info.plist with
    // NSBluetoothAlwaysUsageDescription.  A CLI has no app bundle, so the plist
    // goes into the __TEXT,__info_plist section of the Mach-O binary via the
    // linker's `-sectcreate` flag.
    //
    // Only the `ble` feature talks to CoreBluetooth.  `CARGO_CFG_TARGET_OS` is
    // the *target* OS, so cross-compiling from Linux works too.
    let ble = std::env::var_os("CARGO_FEATURE_BLE").is_some();
    if ble && std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("macos") {
        let dir = std::env::var("CARGO_MANIFEST_DIR")
            .expect("CARGO_MANIFEST_DIR must be set by Cargo");
        let plist = format!("{dir}/Info.plist");

        // ld … -sectcreate __TEXT __info_plist /path/to/Info.plist …
        println!("cargo:rustc-link-arg=-sectcreate");
        println!("cargo:rustc-link-arg=__TEXT");
        println!("cargo:rustc-link-arg=__info_plist");
        println!("cargo:rustc-link-arg={plist}");

        println!("cargo:rerun-if-changed=Info.plist");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
