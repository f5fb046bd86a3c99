/// Declares one or more stream keys for [`RandomStreams::sample`](crate::random::RandomStreams).
///
/// ```ignore
/// define_rng!(PopulationRng, ExposureRng);
/// define_rng!(pub(crate) LabRng);
/// ```
///
/// A key's name seeds its stream, so names are unique across the crate; a second definition
/// with the same name fails to link.
#[macro_export]
macro_rules! define_rng {
    ($($vis:vis $stream:ident),+ $(,)?) => {
        $(
            #[derive(Copy, Clone, Debug)]
            $vis struct $stream;

            impl $crate::random::RngId for $stream {
                type RngType = $crate::rand::rngs::SmallRng;

                fn get_name() -> &'static str {
                    stringify!($stream)
                }
            }

            $crate::paste::paste! {
                #[doc(hidden)]
                #[no_mangle]
                #[allow(non_upper_case_globals)]
                pub static [<outbreak_rng_stream_ $stream>]: () = ();
            }
        )+
    };
}
pub use define_rng;
