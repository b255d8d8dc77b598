fn main() {
    envforge::boot::boot();
}
