fn main() {
    let code = gpu_flocking::app::exit_code(gpu_flocking::app::run());
    std::process::exit(code);
}
