mod queue_lifecycle;
