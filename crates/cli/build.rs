fn main() {
    let mut features = vec!["base"];
    if std::env::var_os("CARGO_FEATURE_PDFIUM").is_some() {
        features.push("pdfium");
    }
    if std::env::var_os("CARGO_FEATURE_OCR").is_some() {
        features.push("ocr");
    }
    println!("cargo:rustc-env=FINRAG_FEATURES={}", features.join(", "));
}
