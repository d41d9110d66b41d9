use rover_kinematics::*;

fn main() {
    let mut current_pose = Pose::new(0.0, 0.0, 0.0);
    let control = Control::new(1.0, 0.2); // 1.0 m/s forward, 0.2 rad/s turning
    let dt = 0.1; // Time step in seconds
    let num_steps = 20;

    println!("Initializing simulation...");
    println!("  Initial State:");
    println!("    Pose:         {:?}", current_pose);
    println!("    Control:      {:?}", control);
    println!("  Simulation Settings:");
    println!("    Time Step:    {} s", dt);
    println!("    Num Steps:    {}", num_steps);
    println!("\nSimulating...");

    for i in 0..num_steps {
        current_pose = predict(current_pose, control, dt);
        println!("Step {:>2}: Pose: {}", i + 1, current_pose);
    }

    println!("\nSimulation complete.");
    println!("Final Pose: {:?}", current_pose);
}
