/// The ESP-NOW C API is linked from the vendor blobs.
const ESP_NOW_BACKEND: &str = "esp_now_backend";
/// The receive callback gets an `esp_now_recv_info_t` instead of the bare source address.
const RECV_INFO_CALLBACK: &str = "recv_info_callback";

const ESP32_META: &[&str] = &[ESP_NOW_BACKEND, RECV_INFO_CALLBACK];
const ESP32S2_META: &[&str] = &[ESP_NOW_BACKEND, RECV_INFO_CALLBACK];

fn main() {
    println!("cargo:rustc-check-cfg=cfg(esp_now_backend)");
    println!("cargo:rustc-check-cfg=cfg(recv_info_callback)");
    let meta = match (cfg!(feature = "esp32"), cfg!(feature = "esp32s2")) {
        (true, true) => panic!("You must select at most one chip."),
        (true, false) => ESP32_META,
        (false, true) => ESP32S2_META,
        // Without a chip the driver builds against the `Radio` trait only.
        (false, false) => &[],
    };
    for item in meta {
        println!("cargo:rustc-cfg={item}");
    }
}
