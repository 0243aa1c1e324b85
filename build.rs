// If QVGA boot resolution not specified, boot the sensor at VGA resolution
fn main() {
    if !cfg!(feature = "boot-qvga") {
        println!("cargo:rustc-cfg=feature=\"boot-vga\"");
    }
}
