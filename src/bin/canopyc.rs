fn main() {
    canopy::cli::run();
}
