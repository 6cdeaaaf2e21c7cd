fn main() {
    pose_capture::run_cli();
}
