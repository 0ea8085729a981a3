/// Forward the identity, parameter and program methods of [`Plugin`] to
/// an inner plugin field. Used inside `impl Plugin for Wrapper` blocks.
///
/// [`Plugin`]: sonara_kernel::Plugin
macro_rules! forward_plugin_metadata {
    ($inner:ident) => {
        fn abi_version(&self) -> u32 {
            self.$inner.abi_version()
        }

        fn identifier(&self) -> String {
            self.$inner.identifier()
        }

        fn name(&self) -> String {
            self.$inner.name()
        }

        fn description(&self) -> String {
            self.$inner.description()
        }

        fn maker(&self) -> String {
            self.$inner.maker()
        }

        fn copyright(&self) -> String {
            self.$inner.copyright()
        }

        fn plugin_version(&self) -> i32 {
            self.$inner.plugin_version()
        }

        fn input_sample_rate(&self) -> f32 {
            self.$inner.input_sample_rate()
        }

        fn parameter_descriptors(&self) -> Vec<sonara_kernel::ParameterDescriptor> {
            self.$inner.parameter_descriptors()
        }

        fn parameter(&self, identifier: &str) -> f32 {
            self.$inner.parameter(identifier)
        }

        fn set_parameter(&mut self, identifier: &str, value: f32) {
            self.$inner.set_parameter(identifier, value)
        }

        fn programs(&self) -> Vec<String> {
            self.$inner.programs()
        }

        fn current_program(&self) -> String {
            self.$inner.current_program()
        }

        fn select_program(&mut self, name: &str) {
            self.$inner.select_program(name)
        }
    };
}
