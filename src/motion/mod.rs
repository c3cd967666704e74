// Motion layer: joint registry, arcade-drive kinematics, and the named
// joint commands / full-body helpers built on the shared bus.
pub mod joints;
pub mod kinematics;
pub mod body;
