macro_rules! emit {
    ($context:expr, $opcode:expr) => {
        $context.push(format!("\t{}", $opcode))
    };

    ($context:expr, $opcode:expr, $($format:tt)*) => {
        $context.push(format!("\t{:8}{}", $opcode, format_args!($($format)*)))
    };
}
