// Shorthand for reacting to futures-signals values
#[macro_export]
macro_rules! future {
    (($($params:tt)*) $body:block) => {
        move |$($params)*| {
            $body

            async {}
        }
    };
}

#[macro_export]
macro_rules! signal {
    ($source:expr, ($($params:tt)*) $body:block) => {
        $source.signal().for_each($crate::future!(($($params)*) $body))
    };
}
