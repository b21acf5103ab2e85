// Links the C++ standard library required by intel_tex_2's ISPC kernels
// (pulled in via image_dds).

fn main() {
    #[cfg(target_os = "linux")]
    println!("cargo:rustc-link-lib=stdc++");

    #[cfg(target_os = "macos")]
    println!("cargo:rustc-link-lib=c++");
}
